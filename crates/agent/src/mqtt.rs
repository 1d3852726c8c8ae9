//! Broker MQTT via `rumqttc` (API síncrona).
//!
//! O `Client` só enfileira; a `Connection` precisa ser drenada numa thread
//! própria, que também cuida da reconexão.

use airnode_core::config::BrokerConfig;
use airnode_core::outputs::{Broker, Qos};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Capacidade da fila de requisições do cliente.
const REQUEST_QUEUE: usize = 32;

/// Keep-alive mínimo aceito pelo rumqttc.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

pub struct MqttBroker {
    client: Client,
}

impl MqttBroker {
    /// Cria o cliente e inicia a thread da conexão.
    pub fn connect(cfg: &BrokerConfig, node_id: &str) -> std::io::Result<Self> {
        let client_id = if cfg.client_id.is_empty() {
            node_id.to_string()
        } else {
            cfg.client_id.clone()
        };

        let mut options = MqttOptions::new(client_id, cfg.host.clone(), cfg.port);
        options.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS)));

        let (client, connection) = Client::new(options, REQUEST_QUEUE);
        let endpoint = format!("{}:{}", cfg.host, cfg.port);

        std::thread::Builder::new()
            .name("mqtt-connection".into())
            .spawn(move || connection_loop(connection, &endpoint))?;

        Ok(Self { client })
    }
}

fn connection_loop(mut connection: Connection, endpoint: &str) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => info!("Broker conectado em {endpoint}"),
            Ok(event) => debug!("MQTT: {event:?}"),
            Err(e) => {
                warn!("Erro no broker {endpoint}: {e}. Tentando novamente em 2s...");
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
}

fn to_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

impl Broker for MqttBroker {
    fn publish(&mut self, topic: &str, payload: &str, qos: Qos) {
        // Fila cheia ou cliente parado: a mensagem é descartada.
        if let Err(e) = self
            .client
            .try_publish(topic, to_qos(qos), false, payload.as_bytes().to_vec())
        {
            debug!("Publicação em {topic} descartada: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_levels_map_one_to_one() {
        assert_eq!(to_qos(Qos::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(to_qos(Qos::AtLeastOnce), QoS::AtLeastOnce);
        assert_eq!(to_qos(Qos::ExactlyOnce), QoS::ExactlyOnce);
    }
}
