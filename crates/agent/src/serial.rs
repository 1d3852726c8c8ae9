//! Thread de leitura do PMS7003 pela porta serial.
//!
//! A porta deve estar configurada (9600 8N1, raw) antes de o agente subir,
//! por exemplo via `stty`. Os bytes alimentam o [`ParticulateSampler`] e
//! cada nova média vai para o dispatcher.

use airnode_core::NodeEvent;
use airnode_core::particulate::ParticulateSampler;
use crossbeam_channel::Sender;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const REOPEN_DELAY: Duration = Duration::from_secs(5);

pub fn spawn_pms_reader(
    device: PathBuf,
    sampler: ParticulateSampler,
    tx: Sender<NodeEvent>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("pms-reader".into())
        .spawn(move || reader_loop(&device, sampler, &tx))?;
    Ok(())
}

fn reader_loop(device: &Path, mut sampler: ParticulateSampler, tx: &Sender<NodeEvent>) {
    loop {
        match File::open(device) {
            Ok(mut port) => {
                info!("PMS7003 em {}", device.display());
                let mut buf = [0u8; 64];
                loop {
                    match port.read(&mut buf) {
                        Ok(0) => {
                            warn!("PMS7003: fim de stream em {}", device.display());
                            break;
                        }
                        Ok(n) => {
                            if let Some(reading) = sampler.feed(&buf[..n], Instant::now()) {
                                if tx.send(NodeEvent::Particulate(reading)).is_err() {
                                    return; // Dispatcher encerrado
                                }
                            }
                        }
                        Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                        Err(e) => {
                            warn!("Erro lendo {}: {e}", device.display());
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!(
                    "Falha ao abrir {}: {e}. Tentando novamente em {}s...",
                    device.display(),
                    REOPEN_DELAY.as_secs()
                );
            }
        }
        std::thread::sleep(REOPEN_DELAY);
    }
}
