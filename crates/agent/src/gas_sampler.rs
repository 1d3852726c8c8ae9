//! Amostragem do sensor MQ pelo ADC (interface IIO do Linux).
//!
//! Alterna os regimes do aquecedor e, no fim de cada um, faz uma rajada de
//! leituras e dispara o evento do regime. Sensor desconectado vira
//! [`GasEvent::SensorOff`] e a thread passa a testar a presença dele até
//! voltar. O controle PWM do aquecedor fica fora do agente (hardware).

use airnode_core::NodeEvent;
use airnode_core::gas::{GasEvent, HeaterCycle, SAMPLE_SPACING, SAMPLES_PER_BURST};
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn spawn_gas_sampler(adc_path: PathBuf, tx: Sender<NodeEvent>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("mq-sampler".into())
        .spawn(move || sampler_loop(&adc_path, &tx))?;
    Ok(())
}

fn read_adc(path: &Path) -> Option<u16> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Coleta uma rajada; leituras com falha são ignoradas.
fn burst(path: &Path) -> Vec<u16> {
    let mut samples = Vec::with_capacity(SAMPLES_PER_BURST);
    for _ in 0..SAMPLES_PER_BURST {
        if let Some(value) = read_adc(path) {
            samples.push(value);
        }
        std::thread::sleep(SAMPLE_SPACING);
    }
    samples
}

fn sampler_loop(adc_path: &Path, tx: &Sender<NodeEvent>) {
    let burst_time = SAMPLE_SPACING * SAMPLES_PER_BURST as u32;
    let mut cycle = HeaterCycle::new();
    info!("Sensor MQ em {}", adc_path.display());

    loop {
        std::thread::sleep(cycle.wait(burst_time));
        let regime = cycle.regime();
        let samples = burst(adc_path);

        let Some(event) = cycle.on_burst(&samples) else {
            continue;
        };
        if let GasEvent::Methane(value) | GasEvent::Volatile(value) = event {
            info!("MQ {:?}: {value} ({} amostras)", regime.kind(), samples.len());
        }
        if tx.send(NodeEvent::Gas(event)).is_err() {
            return; // Dispatcher encerrado
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_raw_adc_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, "2048\n").unwrap();
        assert_eq!(read_adc(&path), Some(2048));

        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(read_adc(&path), None);
        assert_eq!(read_adc(&dir.path().join("missing")), None);
    }
}
