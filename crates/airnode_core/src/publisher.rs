//! Publicação periódica das médias de particulado no broker.
//!
//! Roda em cadência fixa, independente da conectividade: o cliente do broker
//! enfileira ou descarta sozinho.

use crate::outputs::{Broker, Indicator, Qos};
use crate::state::SensorState;
use crate::types::{ParticulateMetric, format_value, volatile_topic};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Média ≤ 10 µm ainda inválida, ciclo inteiro pulado
    Skipped,
    /// Quantidade de mensagens publicadas
    Published(usize),
}

#[derive(Debug, Clone)]
pub struct PeriodicPublisher {
    node_id: String,
    qos: Qos,
}

impl PeriodicPublisher {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            qos: Qos::AtMostOnce,
        }
    }

    /// Executa um ciclo de publicação.
    ///
    /// Se a média ≤ 10 µm não é válida nada é publicado, para não
    /// dessincronizar o conjunto de métricas.
    pub fn run_cycle(
        &self,
        state: &SensorState,
        broker: &mut dyn Broker,
        indicator: &mut dyn Indicator,
    ) -> PublishOutcome {
        if state.read_particulate(ParticulateMetric::Pm10).is_none() {
            debug!("Média PM10 indisponível, publicação pulada");
            return PublishOutcome::Skipped;
        }

        indicator.toggle();
        let mut sent = 0;
        for metric in ParticulateMetric::PUBLISH_ORDER {
            // Leituras independentes; `null` é reservado ao reset de ONLINE.
            let Some(value) = state.read_particulate(metric) else {
                debug!("Média {} indisponível, tópico pulado", metric.report_label());
                continue;
            };
            broker.publish(&metric.topic(&self.node_id), &format_value(value), self.qos);
            sent += 1;
        }
        indicator.toggle();

        trace!("{sent} métricas publicadas");
        PublishOutcome::Published(sent)
    }

    /// Publica uma leitura de voláteis em `co/<node-id>`.
    pub fn publish_volatile(&self, value: f64, broker: &mut dyn Broker, indicator: &mut dyn Indicator) {
        indicator.toggle();
        broker.publish(&volatile_topic(&self.node_id), &format_value(value), self.qos);
        indicator.toggle();
    }
}
