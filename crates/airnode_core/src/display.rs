//! Visão das leituras para o display local.
//!
//! Espelha a tela do nó: status de rede, valores instantâneos do PMS7003,
//! média curta (~5 min), contagem de partículas por faixa e o nível de
//! CO/voláteis. O nó mantém uma [`ReadingsView`] e a reenvia ao
//! [`crate::outputs::StatusDisplay`] a cada atualização.

use crate::connectivity::LinkState;
use crate::particulate::ParticulateReading;
use crate::pms::PmSample;
use crate::types::ParticulateAverages;

/// Leitura máxima da escala do sensor MQ; mostrada como `OVR`.
pub const GAS_FULL_SCALE: f64 = 1000.0;

/// Rótulos das faixas de contagem do PMS7003 (partículas por 0.1 L).
pub const COUNT_BINS: [&str; 6] = ["0.3um", "0.5um", "1um", "2.5um", "5um", "10um"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingsView {
    pub status: LinkState,
    /// Último frame (concentração atmosférica)
    pub instant: Option<PmSample>,
    /// Média curta
    pub recent: ParticulateAverages,
    pub counts: Option<[u16; 6]>,
    /// Nível de CO/voláteis
    pub volatile: Option<f64>,
}

impl ReadingsView {
    pub fn update_particulate(&mut self, reading: &ParticulateReading) {
        self.instant = Some(reading.instant);
        self.recent = reading.recent;
        self.counts = Some(reading.counts);
    }

    /// Linhas de texto da tela.
    pub fn render(&self) -> Vec<String> {
        let mut first = self.status.status_text().to_string();
        if let Some(pm) = self.instant {
            first.push_str(&format!(
                " PM1 {} | PM2.5 {} | PM10 {}",
                pm.pm1_0, pm.pm2_5, pm.pm10
            ));
        }
        if let Some(co) = self.volatile {
            first.push_str(&format!(" | CO {}", gas_text(co)));
        }

        let mut lines = vec![first];
        if self.instant.is_none() {
            return lines;
        }

        lines.push(format!(
            "~ PM1 {} | PM2.5 {} | PM10 {}",
            average_text(self.recent.pm1_0),
            average_text(self.recent.pm2_5),
            average_text(self.recent.pm10)
        ));
        if let Some(counts) = self.counts {
            let bins: Vec<String> = COUNT_BINS
                .iter()
                .zip(counts)
                .map(|(bin, n)| format!("{bin} {n}"))
                .collect();
            lines.push(bins.join(" | "));
        }
        lines
    }
}

/// Nível de gás inteiro; fundo de escala vira `OVR`.
pub fn gas_text(value: f64) -> String {
    if value >= GAS_FULL_SCALE {
        "OVR".into()
    } else {
        format!("{value:.0}")
    }
}

fn average_text(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1}"))
}
