//! LED indicador via sysfs e display de status/leituras em log.

use airnode_core::display::ReadingsView;
use airnode_core::outputs::{Indicator, StatusDisplay};
use std::path::PathBuf;
use tracing::{debug, info};

/// LED em `/sys/class/leds/<nome>`; alterna o arquivo `brightness`.
pub struct SysfsLed {
    brightness: PathBuf,
    lit: bool,
    failed: bool,
}

impl SysfsLed {
    pub fn new(led_dir: impl Into<PathBuf>) -> Self {
        Self {
            brightness: led_dir.into().join("brightness"),
            lit: false,
            failed: false,
        }
    }
}

impl Indicator for SysfsLed {
    fn toggle(&mut self) {
        self.lit = !self.lit;
        let value = if self.lit { "1" } else { "0" };
        if let Err(e) = std::fs::write(&self.brightness, value) {
            // Só registra a primeira falha: o LED é apenas diagnóstico.
            if !self.failed {
                debug!("LED {} indisponível: {e}", self.brightness.display());
                self.failed = true;
            }
        }
    }
}

/// Mostra o status de conectividade no log; a tela de leituras (atualizada
/// a cada frame do PMS7003) só aparece em nível debug.
#[derive(Debug, Default)]
pub struct LogStatusDisplay;

impl StatusDisplay for LogStatusDisplay {
    fn show_status(&mut self, status: &str) {
        info!("Status: {status}");
    }

    fn show_readings(&mut self, view: &ReadingsView) {
        for line in view.render() {
            debug!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_brightness_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut led = SysfsLed::new(dir.path());
        led.toggle();
        assert_eq!(std::fs::read_to_string(dir.path().join("brightness")).unwrap(), "1");
        led.toggle();
        assert_eq!(std::fs::read_to_string(dir.path().join("brightness")).unwrap(), "0");
    }

    #[test]
    fn missing_led_is_tolerated() {
        let mut led = SysfsLed::new("/nonexistent/led");
        led.toggle();
        led.toggle();
        assert!(led.failed);
    }
}
