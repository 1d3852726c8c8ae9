//! Saídas consumidas pelo núcleo: broker pub/sub, LED indicador e display
//! de status. Implementações concretas ficam no agente.

use crate::display::ReadingsView;

/// Nível de QoS MQTT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Cliente do broker. Fire-and-forget: falhas de envio não voltam ao núcleo,
/// o cliente enfileira ou descarta por conta própria.
pub trait Broker {
    fn publish(&mut self, topic: &str, payload: &str, qos: Qos);
}

/// Indicador visual (LED). Apenas diagnóstico, nunca sinal de corretude.
pub trait Indicator {
    fn toggle(&mut self);
}

/// Display local: status de conectividade (`^`, `...`, `_`) e a tela de
/// leituras.
pub trait StatusDisplay {
    fn show_status(&mut self, status: &str);

    fn show_readings(&mut self, view: &ReadingsView);
}

/// Indicador que não faz nada (nó sem LED configurado).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn toggle(&mut self) {}
}

impl<B: Broker + ?Sized> Broker for Box<B> {
    fn publish(&mut self, topic: &str, payload: &str, qos: Qos) {
        (**self).publish(topic, payload, qos);
    }
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn toggle(&mut self) {
        (**self).toggle();
    }
}

impl<S: StatusDisplay + ?Sized> StatusDisplay for Box<S> {
    fn show_status(&mut self, status: &str) {
        (**self).show_status(status);
    }

    fn show_readings(&mut self, view: &ReadingsView) {
        (**self).show_readings(view);
    }
}
