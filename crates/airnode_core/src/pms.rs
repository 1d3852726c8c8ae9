//! Decodificador de frames do sensor Plantower PMS7003 (UART 9600 8N1).
//!
//! ```text
//! ┌──────┬──────┬────────┬────────────────────────┬──────────┐
//! │ 0x42 │ 0x4D │ len(2) │ 13 words big-endian    │ soma(2)  │
//! └──────┴──────┴────────┴────────────────────────┴──────────┘
//! ```
//!
//! A soma é a soma simples dos 30 primeiros bytes.

use tracing::{debug, warn};

pub const FRAME_LEN: usize = 32;
const HEADER: [u8; 2] = [0x42, 0x4D];
const CHECKSUM_OFFSET: usize = FRAME_LEN - 2;

/// Concentrações em µg/m³ de uma amostra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmSample {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10: u16,
}

/// Frame decodificado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmsFrame {
    /// Concentração em ambiente atmosférico; é a usada nas médias
    pub atmospheric: PmSample,
    /// Partículas por 0.1 L: >0.3, >0.5, >1, >2.5, >5, >10 µm
    pub counts: [u16; 6],
}

impl PmsFrame {
    /// Decodifica um frame completo de [`FRAME_LEN`] bytes.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() != FRAME_LEN || frame[..2] != HEADER {
            return None;
        }
        let expected = word(frame, CHECKSUM_OFFSET);
        let actual = checksum(&frame[..CHECKSUM_OFFSET]);
        if expected != actual {
            warn!("PMS7003: checksum inválido {actual:04X} != {expected:04X}");
            return None;
        }

        // Words 0..2 trazem a concentração padrão (CF=1), não usada.
        let w = |i: usize| word(frame, 4 + i * 2);
        Some(Self {
            atmospheric: PmSample {
                pm1_0: w(3),
                pm2_5: w(4),
                pm10: w(5),
            },
            counts: [w(6), w(7), w(8), w(9), w(10), w(11)],
        })
    }
}

fn word(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Decodificador incremental: aceita bytes em qualquer fragmentação e
/// ressincroniza no cabeçalho depois de lixo ou frame corrompido.
#[derive(Debug, Default)]
pub struct PmsDecoder {
    buffer: Vec<u8>,
}

impl PmsDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<PmsFrame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            match self.buffer.windows(2).position(|w| w == HEADER) {
                Some(0) => {}
                Some(start) => {
                    debug!("PMS7003: {start} bytes descartados antes do cabeçalho");
                    self.buffer.drain(..start);
                }
                None => {
                    // Guarda um possível primeiro byte de cabeçalho
                    let keep = usize::from(self.buffer.last() == Some(&HEADER[0]));
                    let cut = self.buffer.len() - keep;
                    self.buffer.drain(..cut);
                    break;
                }
            }

            if self.buffer.len() < FRAME_LEN {
                break;
            }

            match PmsFrame::parse(&self.buffer[..FRAME_LEN]) {
                Some(frame) => {
                    frames.push(frame);
                    self.buffer.drain(..FRAME_LEN);
                }
                // Pula o cabeçalho corrompido e procura o próximo
                None => {
                    self.buffer.drain(..1);
                }
            }
        }

        frames
    }
}

#[cfg(test)]
pub(crate) fn encode_frame(atmospheric: PmSample) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..2].copy_from_slice(&HEADER);
    frame[2..4].copy_from_slice(&28u16.to_be_bytes());
    let words = [
        atmospheric.pm1_0,
        atmospheric.pm2_5,
        atmospheric.pm10,
        atmospheric.pm1_0,
        atmospheric.pm2_5,
        atmospheric.pm10,
        1200,
        400,
        90,
        12,
        3,
        1,
    ];
    for (i, w) in words.iter().enumerate() {
        frame[4 + i * 2..6 + i * 2].copy_from_slice(&w.to_be_bytes());
    }
    let sum = checksum(&frame[..CHECKSUM_OFFSET]);
    frame[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_be_bytes());
    frame
}
