//! Tipos básicos das leituras do nó sensor.
//!
//! Métricas de material particulado, tipos de gás e o mapeamento fixo de
//! cada métrica para tópicos do broker e tags do agregador.

// ──────────────────────────────────────────────
// Material particulado
// ──────────────────────────────────────────────

/// Faixa de tamanho de partícula medida pelo sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticulateMetric {
    /// Partículas ≤ 1 µm
    Pm1_0,
    /// Partículas ≤ 2.5 µm
    Pm2_5,
    /// Partículas ≤ 10 µm
    Pm10,
}

impl ParticulateMetric {
    /// Ordem das linhas no relatório do agregador.
    pub const REPORT_ORDER: [ParticulateMetric; 3] = [Self::Pm1_0, Self::Pm2_5, Self::Pm10];

    /// Ordem de publicação periódica no broker.
    pub const PUBLISH_ORDER: [ParticulateMetric; 3] = [Self::Pm10, Self::Pm2_5, Self::Pm1_0];

    /// Prefixo do tópico no broker.
    ///
    /// A métrica ≤ 10 µm sai em `pm100` e a ≤ 1 µm em `pm10`; consumidores
    /// existentes dependem exatamente desse mapeamento.
    pub fn topic_prefix(self) -> &'static str {
        match self {
            Self::Pm1_0 => "pm10",
            Self::Pm2_5 => "pm25",
            Self::Pm10 => "pm100",
        }
    }

    /// Tag da linha no protocolo do agregador.
    pub fn report_tag(self) -> &'static str {
        match self {
            Self::Pm1_0 => "PM1_0",
            Self::Pm2_5 => "PM2_5",
            Self::Pm10 => "PM10_0",
        }
    }

    /// Rótulo legível enviado ao agregador.
    pub fn report_label(self) -> &'static str {
        match self {
            Self::Pm1_0 => "PM1",
            Self::Pm2_5 => "PM2.5",
            Self::Pm10 => "PM10",
        }
    }

    pub fn from_report_tag(tag: &str) -> Option<Self> {
        Self::REPORT_ORDER.into_iter().find(|m| m.report_tag() == tag)
    }

    /// Tópico completo para um nó.
    pub fn topic(self, node_id: &str) -> String {
        format!("{}/{}", self.topic_prefix(), node_id)
    }
}

/// Médias móveis das três faixas. `None` = janela ainda sem dados válidos.
///
/// Cada métrica é independente: validade parcial é permitida.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticulateAverages {
    pub pm1_0: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

impl ParticulateAverages {
    /// Constrói a partir de valores crus de driver (negativo = inválido).
    pub fn from_raw(pm1_0: f64, pm2_5: f64, pm10: f64) -> Self {
        Self {
            pm1_0: valid_reading(pm1_0),
            pm2_5: valid_reading(pm2_5),
            pm10: valid_reading(pm10),
        }
    }

    pub fn get(&self, metric: ParticulateMetric) -> Option<f64> {
        match metric {
            ParticulateMetric::Pm1_0 => self.pm1_0,
            ParticulateMetric::Pm2_5 => self.pm2_5,
            ParticulateMetric::Pm10 => self.pm10,
        }
    }

    pub fn set(&mut self, metric: ParticulateMetric, value: Option<f64>) {
        let value = value.and_then(valid_reading);
        match metric {
            ParticulateMetric::Pm1_0 => self.pm1_0 = value,
            ParticulateMetric::Pm2_5 => self.pm2_5 = value,
            ParticulateMetric::Pm10 => self.pm10 = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pm1_0.is_none() && self.pm2_5.is_none() && self.pm10.is_none()
    }
}

/// Normaliza o sentinela do driver (`< 0` ou não finito) para `None`.
pub fn valid_reading(value: f64) -> Option<f64> {
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

// ──────────────────────────────────────────────
// Gases
// ──────────────────────────────────────────────

/// Categoria de leitura do sensor de gás (série MQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GasKind {
    /// Regime quente (aquecedor em potência total): metano/combustíveis
    Methane,
    /// Regime de baixa potência: CO e voláteis orgânicos
    Volatile,
}

impl GasKind {
    pub fn report_tag(self) -> &'static str {
        match self {
            Self::Methane => "HI",
            Self::Volatile => "LO",
        }
    }

    pub fn from_report_tag(tag: &str) -> Option<Self> {
        match tag {
            "HI" => Some(Self::Methane),
            "LO" => Some(Self::Volatile),
            _ => None,
        }
    }
}

/// Tópico da leitura de voláteis no broker.
pub fn volatile_topic(node_id: &str) -> String {
    format!("co/{node_id}")
}

/// Formata um valor numérico como um serializador JSON faria
/// (`12.3`, `5.6`, `12`). Valores não finitos viram `null`.
pub fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        "null".into()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
