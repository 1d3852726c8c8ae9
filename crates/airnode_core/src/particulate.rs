//! Médias móveis de particulado sobre uma janela circular de amostras.
//!
//! Com o PMS7003 emitindo ~1 frame/s em modo ativo, 1286 pontos cobrem
//! cerca de 10 minutos (na prática o sensor alterna entre ~0.5 e ~2 s).

use crate::pms::{PmSample, PmsDecoder};
use crate::types::{ParticulateAverages, ParticulateMetric};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::error;

/// Capacidade padrão: suficiente para ~1 hora de média.
pub const DEFAULT_CAPACITY: usize = 3857;

/// Pontos padrão da média publicada.
pub const DEFAULT_WINDOW_POINTS: usize = 1286;

/// Amostras descartadas logo após o boot (sensor estabilizando).
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(30);

/// Pontos da média curta mostrada no display (~5 min).
pub const DISPLAY_WINDOW_POINTS: usize = 321;

/// Resultado de um lote de frames: médias para os relatórios e dados do
/// último frame para o display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticulateReading {
    /// Média de N pontos (broker e agregador)
    pub averages: ParticulateAverages,
    /// Média curta de [`DISPLAY_WINDOW_POINTS`]
    pub recent: ParticulateAverages,
    pub instant: PmSample,
    pub counts: [u16; 6],
}

#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<PmSample>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: PmSample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Média das últimas `points` amostras (ou de todas, se houver menos).
    ///
    /// `None` se a janela está vazia ou se `points` excede a capacidade.
    pub fn average(&self, metric: ParticulateMetric, points: usize) -> Option<f64> {
        if points > self.capacity {
            error!("Pontos demais para a média: {points} > {}", self.capacity);
            return None;
        }
        let take = points.min(self.samples.len());
        if take == 0 {
            return None;
        }

        let sum: f64 = self
            .samples
            .iter()
            .rev()
            .take(take)
            .map(|s| f64::from(pick(s, metric)))
            .sum();
        Some(sum / take as f64)
    }

    pub fn averages(&self, points: usize) -> ParticulateAverages {
        ParticulateAverages {
            pm1_0: self.average(ParticulateMetric::Pm1_0, points),
            pm2_5: self.average(ParticulateMetric::Pm2_5, points),
            pm10: self.average(ParticulateMetric::Pm10, points),
        }
    }
}

fn pick(sample: &PmSample, metric: ParticulateMetric) -> u16 {
    match metric {
        ParticulateMetric::Pm1_0 => sample.pm1_0,
        ParticulateMetric::Pm2_5 => sample.pm2_5,
        ParticulateMetric::Pm10 => sample.pm10,
    }
}

/// Driver de particulado: bytes da UART → frames → janela → médias.
#[derive(Debug)]
pub struct ParticulateSampler {
    decoder: PmsDecoder,
    window: RollingWindow,
    points: usize,
    started: Instant,
    warmup: Duration,
}

impl ParticulateSampler {
    pub fn new(capacity: usize, points: usize, warmup: Duration, started: Instant) -> Self {
        Self {
            decoder: PmsDecoder::new(),
            window: RollingWindow::new(capacity),
            points,
            started,
            warmup,
        }
    }

    /// Consome bytes crus. Retorna a nova leitura se algum frame entrou
    /// na janela.
    pub fn feed(&mut self, bytes: &[u8], now: Instant) -> Option<ParticulateReading> {
        let frames = self.decoder.push(bytes);
        let last = *frames.last()?;
        if now.saturating_duration_since(self.started) < self.warmup {
            return None;
        }
        for frame in &frames {
            self.window.push(frame.atmospheric);
        }
        Some(ParticulateReading {
            averages: self.window.averages(self.points),
            recent: self
                .window
                .averages(DISPLAY_WINDOW_POINTS.min(self.window.capacity)),
            instant: last.atmospheric,
            counts: last.counts,
        })
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }
}
