//! Estado compartilhado das leituras do nó.
//!
//! Registro único criado na inicialização e atualizado no lugar até o fim
//! do processo. Todas as operações são totais. O acesso concorrente é
//! serializado pelo dispatcher ([`crate::node::Node`]), que é o único dono.

use crate::types::{GasKind, ParticulateAverages, ParticulateMetric};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorState {
    particulate: ParticulateAverages,
    /// Nível de combustíveis (regime quente)
    methane: Option<f64>,
    /// Nível de voláteis/CO (regime de baixa potência)
    volatile: Option<f64>,
    /// `true` somente enquanto o nó tem endereço de rede
    connected: bool,
}

impl SensorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitui as médias móveis pelas últimas calculadas pelo driver.
    pub fn set_particulate(&mut self, averages: ParticulateAverages) {
        self.particulate = averages;
    }

    pub fn read_particulate(&self, metric: ParticulateMetric) -> Option<f64> {
        self.particulate.get(metric)
    }

    pub fn particulate(&self) -> ParticulateAverages {
        self.particulate
    }

    pub fn update_gas(&mut self, kind: GasKind, value: f64) {
        match kind {
            GasKind::Methane => self.methane = Some(value),
            GasKind::Volatile => self.volatile = Some(value),
        }
    }

    pub fn clear_gas(&mut self) {
        self.methane = None;
        self.volatile = None;
    }

    pub fn gas(&self, kind: GasKind) -> Option<f64> {
        match kind {
            GasKind::Methane => self.methane,
            GasKind::Volatile => self.volatile,
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_and_offline() {
        let state = SensorState::new();
        assert!(!state.is_connected());
        assert!(state.particulate().is_empty());
        assert_eq!(state.gas(GasKind::Methane), None);
        assert_eq!(state.gas(GasKind::Volatile), None);
    }

    #[test]
    fn gas_fields_are_independent() {
        let mut state = SensorState::new();
        state.update_gas(GasKind::Methane, 120.5);
        state.update_gas(GasKind::Volatile, 33.0);
        assert_eq!(state.gas(GasKind::Methane), Some(120.5));
        assert_eq!(state.gas(GasKind::Volatile), Some(33.0));

        state.update_gas(GasKind::Volatile, 40.0);
        assert_eq!(state.gas(GasKind::Methane), Some(120.5));

        state.clear_gas();
        assert_eq!(state.gas(GasKind::Methane), None);
        assert_eq!(state.gas(GasKind::Volatile), None);
    }

    #[test]
    fn particulate_reads_are_per_metric() {
        let mut state = SensorState::new();
        state.set_particulate(ParticulateAverages::from_raw(5.6, -1.0, 12.3));
        assert_eq!(state.read_particulate(ParticulateMetric::Pm1_0), Some(5.6));
        assert_eq!(state.read_particulate(ParticulateMetric::Pm2_5), None);
        assert_eq!(state.read_particulate(ParticulateMetric::Pm10), Some(12.3));
    }
}
