//! # AirNode Core
//!
//! Crate compartilhada do agente de telemetria do nó sensor: estado das
//! leituras, regras de atualização, protocolos de relatório e agendamento.
//!
//! ## Módulos
//! - [`types`] – Métricas de particulado/gás e mapeamentos de tópicos e tags
//! - [`state`] – Registro único das leituras ([`SensorState`])
//! - [`gas`] – Eventos do sensor MQ e redução de amostras do ADC
//! - [`connectivity`] – Máquina de estados de rede
//! - [`publisher`] – Publicação periódica no broker
//! - [`protocol`] – Formato texto do agregador
//! - [`session`] – Sessão única de envio ao agregador
//! - [`schedule`] – Timers com tempo explícito
//! - [`pms`] / [`particulate`] – Frames do PMS7003 e médias móveis
//! - [`display`] – Tela de leituras do display local
//! - [`config`] – Configuração unificada via TOML
//! - [`node`] – Contexto do nó e despacho de eventos

pub mod types;
pub mod state;
pub mod outputs;
pub mod gas;
pub mod connectivity;
pub mod publisher;
pub mod protocol;
pub mod session;
pub mod schedule;
pub mod pms;
pub mod particulate;
pub mod display;
pub mod config;
pub mod node;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports convenientes
pub use config::AppConfig;
pub use node::{Node, NodeEvent};
pub use state::SensorState;
pub use protocol::{encode_report, decode_report};
