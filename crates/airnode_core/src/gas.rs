//! Eventos do sensor de gás (série MQ) e redução de amostras do ADC.
//!
//! O driver alterna o aquecedor entre dois regimes. Ao fim de cada janela
//! de medição ele dispara um evento de regime com a leitura instantânea;
//! ao desligar o sensor dispara [`GasEvent::SensorOff`]. O tracker confia
//! na semântica do driver: sem filtro, sem debounce.

use crate::state::SensorState;
use crate::types::GasKind;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fator ADC 12 bits → escala 0..1000 exibida.
pub const ADC_TO_VALUE: f64 = 1000.0 / 4095.0;

/// Amostras por medição.
pub const SAMPLES_PER_BURST: usize = 64;

/// Mínimo de amostras para a medição valer (estritamente maior).
pub const MIN_VALID_SAMPLES: usize = 16;

/// Intervalo entre amostras de uma medição.
pub const SAMPLE_SPACING: Duration = Duration::from_millis(20);

/// Com o sensor desligado, intervalo entre rajadas de teste.
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Evento discreto do driver de gás.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GasEvent {
    /// Fim do regime quente, com a leitura medida
    Methane(f64),
    /// Fim do regime de baixa potência, com a leitura medida
    Volatile(f64),
    /// Sensor desligado (botão ou sensor desconectado)
    SensorOff,
}

/// Efeito de um evento sobre o estado.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GasUpdate {
    Stored(GasKind, f64),
    Cleared,
}

/// Ponte entre eventos do driver e o [`SensorState`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GasEventTracker;

impl GasEventTracker {
    pub fn apply(&self, state: &mut SensorState, event: GasEvent) -> GasUpdate {
        match event {
            GasEvent::Methane(value) => {
                state.update_gas(GasKind::Methane, value);
                debug!("Metano: {value}");
                GasUpdate::Stored(GasKind::Methane, value)
            }
            GasEvent::Volatile(value) => {
                state.update_gas(GasKind::Volatile, value);
                debug!("Voláteis: {value}");
                GasUpdate::Stored(GasKind::Volatile, value)
            }
            GasEvent::SensorOff => {
                state.clear_gas();
                info!("Sensor de gás desligado, leituras descartadas");
                GasUpdate::Cleared
            }
        }
    }
}

// ──────────────────────────────────────────────
// Regimes e redução de amostras
// ──────────────────────────────────────────────

/// Regime do aquecedor do sensor MQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterRegime {
    /// Potência total (metano)
    High,
    /// Duty cycle reduzido (CO/voláteis)
    Low,
}

impl HeaterRegime {
    /// Duração de um ciclo completo do regime.
    pub fn duration(self) -> Duration {
        match self {
            Self::High => Duration::from_secs(60),
            Self::Low => Duration::from_secs(90),
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::High => Self::Low,
            Self::Low => Self::High,
        }
    }

    pub fn kind(self) -> GasKind {
        match self {
            Self::High => GasKind::Methane,
            Self::Low => GasKind::Volatile,
        }
    }

    /// Evento correspondente a uma leitura válida neste regime.
    pub fn event(self, value: f64) -> GasEvent {
        match self {
            Self::High => GasEvent::Methane(value),
            Self::Low => GasEvent::Volatile(value),
        }
    }
}

/// Resultado de uma rajada de amostras.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleReduction {
    Reading(f64),
    /// Poucas amostras, medição descartada
    Insufficient,
    /// Soma zero em potência total: sensor provavelmente desconectado
    Disconnected,
}

/// Reduz uma rajada de amostras cruas do ADC a uma leitura.
///
/// Média × [`ADC_TO_VALUE`], arredondada em duas casas.
pub fn reduce_samples(regime: HeaterRegime, samples: &[u16]) -> SampleReduction {
    let sum: u64 = samples.iter().map(|&s| u64::from(s)).sum();

    if sum == 0 && regime == HeaterRegime::High {
        return SampleReduction::Disconnected;
    }
    if samples.len() <= MIN_VALID_SAMPLES {
        return SampleReduction::Insufficient;
    }

    let mean = sum as f64 / samples.len() as f64;
    let value = (mean * ADC_TO_VALUE * 100.0).round() / 100.0;
    SampleReduction::Reading(value)
}

/// Ciclo do aquecedor visto pelo amostrador.
///
/// Alterna os regimes a cada rajada. Uma rajada nula em potência total
/// desliga o sensor ([`GasEvent::SensorOff`]); desligado, cada rajada é só
/// um teste de presença, e a primeira não nula religa o ciclo no regime
/// quente sem emitir leitura.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterCycle {
    regime: HeaterRegime,
    off: bool,
}

impl Default for HeaterCycle {
    fn default() -> Self {
        Self {
            regime: HeaterRegime::High,
            off: false,
        }
    }
}

impl HeaterCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regime(&self) -> HeaterRegime {
        self.regime
    }

    pub fn is_off(&self) -> bool {
        self.off
    }

    /// Espera antes da próxima rajada, dado o tempo gasto na própria rajada.
    pub fn wait(&self, burst: Duration) -> Duration {
        if self.off {
            RECHECK_INTERVAL
        } else {
            self.regime.duration().saturating_sub(burst)
        }
    }

    /// Processa uma rajada e devolve o evento a despachar, se houver.
    pub fn on_burst(&mut self, samples: &[u16]) -> Option<GasEvent> {
        if self.off {
            if reduce_samples(HeaterRegime::High, samples) != SampleReduction::Disconnected {
                info!("Sensor MQ detectado novamente, retomando ciclo");
                self.off = false;
                self.regime = HeaterRegime::High;
            }
            return None;
        }

        let regime = self.regime;
        match reduce_samples(regime, samples) {
            SampleReduction::Reading(value) => {
                self.regime = regime.next();
                Some(regime.event(value))
            }
            SampleReduction::Insufficient => {
                debug!("MQ {:?}: só {} amostras válidas", regime.kind(), samples.len());
                self.regime = regime.next();
                None
            }
            SampleReduction::Disconnected => {
                warn!("Sensor MQ provavelmente desconectado, aguardando reconexão");
                self.off = true;
                Some(GasEvent::SensorOff)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_clears_after_any_sequence() {
        let tracker = GasEventTracker;
        let mut state = SensorState::new();
        let sequence = [
            GasEvent::Methane(10.0),
            GasEvent::Volatile(3.5),
            GasEvent::Methane(12.0),
            GasEvent::SensorOff,
        ];
        for event in sequence {
            tracker.apply(&mut state, event);
        }
        assert_eq!(state.gas(GasKind::Methane), None);
        assert_eq!(state.gas(GasKind::Volatile), None);

        // Off sem leituras anteriores também é válido
        assert_eq!(tracker.apply(&mut state, GasEvent::SensorOff), GasUpdate::Cleared);
    }

    #[test]
    fn methane_then_volatile_keeps_both() {
        let tracker = GasEventTracker;
        let mut state = SensorState::new();
        assert_eq!(
            tracker.apply(&mut state, GasEvent::Methane(250.0)),
            GasUpdate::Stored(GasKind::Methane, 250.0)
        );
        tracker.apply(&mut state, GasEvent::Volatile(41.2));
        assert_eq!(state.gas(GasKind::Methane), Some(250.0));
        assert_eq!(state.gas(GasKind::Volatile), Some(41.2));
    }

    #[test]
    fn reduction_scales_and_rounds() {
        let samples = [4095u16; SAMPLES_PER_BURST];
        assert_eq!(reduce_samples(HeaterRegime::High, &samples), SampleReduction::Reading(1000.0));

        let samples = [1000u16; 20];
        // 1000 * 1000/4095 = 244.2002...
        assert_eq!(reduce_samples(HeaterRegime::Low, &samples), SampleReduction::Reading(244.2));
    }

    #[test]
    fn zero_burst_in_high_regime_means_disconnected() {
        let samples = [0u16; SAMPLES_PER_BURST];
        assert_eq!(reduce_samples(HeaterRegime::High, &samples), SampleReduction::Disconnected);
        assert_eq!(reduce_samples(HeaterRegime::Low, &samples), SampleReduction::Reading(0.0));
    }

    #[test]
    fn short_burst_is_discarded() {
        let samples = [100u16; MIN_VALID_SAMPLES];
        assert_eq!(reduce_samples(HeaterRegime::Low, &samples), SampleReduction::Insufficient);
    }

    #[test]
    fn cycle_alternates_and_emits_readings() {
        let mut cycle = HeaterCycle::new();
        let burst = SAMPLE_SPACING * SAMPLES_PER_BURST as u32;
        assert_eq!(cycle.wait(burst), Duration::from_secs(60) - burst);

        assert_eq!(cycle.on_burst(&[4095; 32]), Some(GasEvent::Methane(1000.0)));
        assert_eq!(cycle.regime(), HeaterRegime::Low);
        assert_eq!(cycle.wait(burst), Duration::from_secs(90) - burst);

        // Rajada curta descartada, mas o regime avança
        assert_eq!(cycle.on_burst(&[100; 4]), None);
        assert_eq!(cycle.regime(), HeaterRegime::High);
    }

    #[test]
    fn disconnected_sensor_is_rechecked_and_resumes() {
        let mut cycle = HeaterCycle::new();
        assert_eq!(cycle.on_burst(&[0; 64]), Some(GasEvent::SensorOff));
        assert!(cycle.is_off());
        assert_eq!(cycle.wait(Duration::ZERO), RECHECK_INTERVAL);

        // Continua desligado, sem novos eventos
        assert_eq!(cycle.on_burst(&[0; 64]), None);
        assert!(cycle.is_off());

        // Sensor de volta: religa no regime quente sem leitura imediata
        assert_eq!(cycle.on_burst(&[2000; 64]), None);
        assert!(!cycle.is_off());
        assert_eq!(cycle.regime(), HeaterRegime::High);
        assert_eq!(cycle.on_burst(&[4095; 64]), Some(GasEvent::Methane(1000.0)));
    }

    #[test]
    fn regimes_alternate() {
        assert_eq!(HeaterRegime::High.next(), HeaterRegime::Low);
        assert_eq!(HeaterRegime::Low.next().kind(), GasKind::Methane);
        assert_eq!(HeaterRegime::Low.event(2.0), GasEvent::Volatile(2.0));
    }
}
