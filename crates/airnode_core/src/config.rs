//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável (ou em `AIRNODE_CONFIG`).
//! Toda seção usa `#[serde(default)]`: um arquivo parcial completa o resto
//! com os valores padrão.

use crate::particulate::{DEFAULT_CAPACITY, DEFAULT_WARMUP, DEFAULT_WINDOW_POINTS};
use crate::session::ReportIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Variável de ambiente com o caminho do arquivo de configuração.
pub const CONFIG_ENV: &str = "AIRNODE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de I/O em {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Identidade do nó.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identificador do nó (sufixo dos tópicos)
    pub name: String,
    /// Endereço de hardware; vazio = MAC da primeira interface
    pub hardware_id: String,
    /// Diretório sysfs do LED indicador (vazio = sem LED)
    pub status_led: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "airnode".into(),
            hardware_id: String::new(),
            status_led: String::new(),
        }
    }
}

/// Sensores de particulado e gás.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Dispositivo serial do PMS7003 (já configurado em 9600 8N1)
    pub pms_device: String,
    /// Pontos da média móvel
    pub window_points: usize,
    /// Capacidade da janela circular
    pub window_capacity: usize,
    /// Amostras ignoradas após o boot (segundos)
    pub warmup_secs: f64,
    /// Habilita o sensor de gás MQ
    pub gas_enabled: bool,
    /// Arquivo IIO com a leitura crua do ADC do sensor MQ
    pub gas_adc_path: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            pms_device: "/dev/ttyS0".into(),
            window_points: DEFAULT_WINDOW_POINTS,
            window_capacity: DEFAULT_CAPACITY,
            warmup_secs: DEFAULT_WARMUP.as_secs_f64(),
            gas_enabled: true,
            gas_adc_path: "/sys/bus/iio/devices/iio:device0/in_voltage0_raw".into(),
        }
    }
}

/// Broker MQTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Vazio = usa o nome do nó
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Cadência da publicação periódica
    pub publish_interval_secs: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 1883,
            client_id: String::new(),
            keep_alive_secs: 30,
            publish_interval_secs: 10.0,
        }
    }
}

/// Agregador de monitoramento ambiental.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub enabled: bool,
    /// `host:porta`
    pub endpoint: String,
    /// Aquecimento antes do primeiro relatório
    pub warmup_secs: f64,
    /// Cadência dos relatórios
    pub interval_secs: f64,
    /// Tempo máximo esperando a confirmação
    pub ack_timeout_secs: f64,
    pub methane_label: String,
    pub volatile_label: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "narodmon.ru:8283".into(),
            warmup_secs: 150.0,
            interval_secs: 300.0,
            ack_timeout_secs: 10.0,
            methane_label: "Горячий режим (MQ7)".into(),
            volatile_label: "ЛОС (MQ7)".into(),
        }
    }
}

/// Detecção de conectividade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Endereço usado para descobrir a rota (nenhum pacote é enviado)
    pub route_check_addr: String,
    /// Intervalo para checar link de rede (segundos)
    pub link_check_interval_secs: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            route_check_addr: "8.8.8.8:80".into(),
            link_check_interval_secs: 10.0,
        }
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub sensors: SensorConfig,
    pub broker: BrokerConfig,
    pub aggregator: AggregatorConfig,
    pub network: NetworkConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Caminho do config.toml: `AIRNODE_CONFIG` ou ao lado do executável.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.node.name.is_empty() {
            errors.push("Nome do nó não pode ser vazio".into());
        }
        for (field, value) in [
            ("node.name", &self.node.name),
            ("node.hardware_id", &self.node.hardware_id),
            ("aggregator.methane_label", &self.aggregator.methane_label),
            ("aggregator.volatile_label", &self.aggregator.volatile_label),
        ] {
            if value.contains('#') || value.contains('\n') {
                errors.push(format!("{field} não pode conter '#' nem quebra de linha"));
            }
        }
        if self.node.name.contains('/') || self.node.name.contains('+') {
            errors.push("node.name não pode conter '/' nem '+' (tópicos MQTT)".into());
        }

        if self.sensors.window_points == 0 {
            errors.push("sensors.window_points não pode ser 0".into());
        }
        if self.sensors.window_points > self.sensors.window_capacity {
            errors.push(format!(
                "sensors.window_points ({}) maior que a capacidade ({})",
                self.sensors.window_points, self.sensors.window_capacity
            ));
        }
        if self.sensors.warmup_secs < 0.0 {
            errors.push("sensors.warmup_secs não pode ser negativo".into());
        }

        if self.broker.port == 0 {
            errors.push("Porta do broker não pode ser 0".into());
        }
        if self.broker.publish_interval_secs < 1.0 || self.broker.publish_interval_secs > 3600.0 {
            errors.push(format!(
                "Intervalo de publicação inválido: {} (1–3600)",
                self.broker.publish_interval_secs
            ));
        }

        if self.aggregator.enabled {
            if !self.aggregator.endpoint.contains(':') {
                errors.push(format!(
                    "Endpoint do agregador inválido: {:?} (esperado host:porta)",
                    self.aggregator.endpoint
                ));
            }
            if self.aggregator.warmup_secs < 0.0 {
                errors.push("aggregator.warmup_secs não pode ser negativo".into());
            }
            if self.aggregator.interval_secs < 1.0 {
                errors.push(format!(
                    "Intervalo do agregador inválido: {} (mínimo 1)",
                    self.aggregator.interval_secs
                ));
            }
            if self.aggregator.ack_timeout_secs <= 0.0 {
                errors.push("aggregator.ack_timeout_secs deve ser positivo".into());
            }
        }

        if self.network.link_check_interval_secs < 0.1 {
            errors.push("network.link_check_interval_secs muito pequeno (mínimo 0.1)".into());
        }

        errors
    }

    /// Cadências e identidade derivadas, prontas para o [`crate::node::Node`].
    pub fn node_settings(&self, hardware_id: &str) -> NodeSettings {
        NodeSettings {
            node_id: self.node.name.clone(),
            publish_interval: secs(self.broker.publish_interval_secs),
            aggregator: self.aggregator.enabled.then(|| AggregatorSettings {
                warmup: secs(self.aggregator.warmup_secs),
                interval: secs(self.aggregator.interval_secs),
                identity: ReportIdentity {
                    hardware_id: hardware_id.into(),
                    node_id: self.node.name.clone(),
                    endpoint: self.aggregator.endpoint.clone(),
                    methane_label: self.aggregator.methane_label.clone(),
                    volatile_label: self.aggregator.volatile_label.clone(),
                },
            }),
        }
    }
}

/// Converte segundos da configuração em [`Duration`] (negativo vira zero).
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Parâmetros de runtime do nó.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    pub node_id: String,
    /// Cadência C1
    pub publish_interval: Duration,
    /// `None` = relatórios ao agregador desabilitados
    pub aggregator: Option<AggregatorSettings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSettings {
    /// Atraso W antes do primeiro relatório
    pub warmup: Duration,
    /// Cadência C2
    pub interval: Duration,
    pub identity: ReportIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.broker.port, parsed.broker.port);
        assert_eq!(config.aggregator.methane_label, parsed.aggregator.methane_label);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[node]
name = "node7"

[aggregator]
interval_secs = 600
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.node.name, "node7");
        assert_eq!(config.aggregator.interval_secs, 600.0);
        // Outros campos devem ter valor padrão
        assert_eq!(config.aggregator.warmup_secs, 150.0);
        assert_eq!(config.broker.publish_interval_secs, 10.0);
        assert_eq!(config.sensors.window_points, 1286);
    }

    #[test]
    fn rejects_separator_in_labels_and_bad_window() {
        let mut config = AppConfig::default();
        config.aggregator.volatile_label = "a#b".into();
        config.sensors.window_points = config.sensors.window_capacity + 1;
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn disabled_aggregator_skips_its_checks() {
        let mut config = AppConfig::default();
        config.aggregator.enabled = false;
        config.aggregator.endpoint = String::new();
        assert!(config.validate().is_empty());
        assert!(config.node_settings("AA").aggregator.is_none());
    }

    #[test]
    fn node_settings_carry_cadences() {
        let settings = AppConfig::default().node_settings("AA-BB-CC-DD-EE-FF");
        assert_eq!(settings.publish_interval, Duration::from_secs(10));
        let agg = settings.aggregator.unwrap();
        assert_eq!(agg.warmup, Duration::from_secs(150));
        assert_eq!(agg.interval, Duration::from_secs(300));
        assert_eq!(agg.identity.hardware_id, "AA-BB-CC-DD-EE-FF");
        assert_eq!(agg.identity.endpoint, "narodmon.ru:8283");
    }

    #[test]
    fn save_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.node.name = "balcony".into();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path);
        assert_eq!(loaded.node.name, "balcony");
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[node\nname = ").unwrap();
        assert_eq!(AppConfig::load(&path).node.name, "airnode");
    }
}
