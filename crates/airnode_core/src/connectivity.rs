//! Máquina de estados de conectividade.
//!
//! ```text
//! DISCONNECTED ──► CONNECTING ──► ONLINE
//!      ▲               │            │
//!      └───────────────┴────────────┘
//! ```
//!
//! As transições vêm somente das notificações da pilha de rede; não há
//! retry aqui. `connected` no [`SensorState`] é a única porta do relatório
//! ao agregador (nunca da publicação periódica).

use crate::outputs::{Broker, Indicator, Qos, StatusDisplay};
use crate::state::SensorState;
use crate::types::ParticulateMetric;
use tracing::info;

/// Payload de reset publicado ao entrar em ONLINE.
pub const RESET_PAYLOAD: &str = "null";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Online,
}

impl LinkState {
    /// Texto do display de status.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Disconnected => "_",
            Self::Connecting => "...",
            Self::Online => "^",
        }
    }
}

/// Notificação da pilha de rede.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Obteve endereço IP
    GotAddress,
    Connecting,
    Disconnected,
}

impl NetworkEvent {
    fn target(self) -> LinkState {
        match self {
            Self::GotAddress => LinkState::Online,
            Self::Connecting => LinkState::Connecting,
            Self::Disconnected => LinkState::Disconnected,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectivityGate {
    state: LinkState,
    node_id: String,
}

impl ConnectivityGate {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            state: LinkState::Disconnected,
            node_id: node_id.into(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Aplica uma notificação. Retorna `true` se o estado mudou.
    ///
    /// Uma notificação que repete o estado atual não executa ações de entrada.
    pub fn handle(
        &mut self,
        event: NetworkEvent,
        sensors: &mut SensorState,
        broker: &mut dyn Broker,
        indicator: &mut dyn Indicator,
        display: &mut dyn StatusDisplay,
    ) -> bool {
        let next = event.target();
        if next == self.state {
            return false;
        }

        info!("Rede: {:?} → {:?}", self.state, next);
        self.state = next;
        sensors.set_connected(next == LinkState::Online);
        display.show_status(next.status_text());

        if next == LinkState::Online {
            indicator.toggle();
            for metric in ParticulateMetric::PUBLISH_ORDER {
                broker.publish(&metric.topic(&self.node_id), RESET_PAYLOAD, Qos::AtMostOnce);
            }
            indicator.toggle();
        }

        true
    }
}
