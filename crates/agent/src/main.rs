//! # AirNode Agent
//!
//! Lê o PMS7003 (particulado) e o sensor MQ (gás), publica as médias num
//! broker MQTT e envia relatórios periódicos a um agregador ambiental.
//!
//! ## Uso
//! ```bash
//! airnode_agent                               # config.toml ao lado do executável
//! AIRNODE_CONFIG=/etc/airnode.toml airnode_agent
//! RUST_LOG=debug airnode_agent                # Log detalhado
//! ```

mod gas_sampler;
mod indicator;
mod link;
mod mqtt;
mod net;
mod serial;

use airnode_core::config::{AppConfig, secs};
use airnode_core::node::{Collaborators, Node, NodeEvent};
use airnode_core::outputs::{Indicator, NoIndicator};
use airnode_core::particulate::ParticulateSampler;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use indicator::{LogStatusDisplay, SysfsLed};
use mqtt::MqttBroker;
use net::TcpLauncher;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Fallback quando nenhuma interface tem MAC utilizável.
const FALLBACK_HARDWARE_ID: &str = "00-00-00-00-00-01";

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config: {e}");
        }
        return ExitCode::FAILURE;
    }

    // ── Identidade ──
    let hardware_id = if config.node.hardware_id.is_empty() {
        link::detect_mac(Path::new("/sys/class/net")).unwrap_or_else(|| {
            warn!("Nenhum MAC encontrado, usando {FALLBACK_HARDWARE_ID}");
            FALLBACK_HARDWARE_ID.to_string()
        })
    } else {
        config.node.hardware_id.clone()
    };
    let settings = config.node_settings(&hardware_id);

    // ── Colaboradores ──
    let broker = match MqttBroker::connect(&config.broker, &settings.node_id) {
        Ok(broker) => broker,
        Err(e) => {
            error!("Falha ao iniciar cliente MQTT: {e}");
            return ExitCode::FAILURE;
        }
    };
    let indicator: Box<dyn Indicator> = if config.node.status_led.is_empty() {
        Box::new(NoIndicator)
    } else {
        Box::new(SysfsLed::new(&config.node.status_led))
    };
    let io = Collaborators {
        broker: Box::new(broker),
        indicator,
        display: Box::new(LogStatusDisplay),
        launcher: Box::new(TcpLauncher::new(secs(config.aggregator.ack_timeout_secs))),
    };
    let mut node = Node::new(settings, io);

    // ── Produtores ──
    let (tx, rx) = crossbeam_channel::unbounded::<NodeEvent>();
    let started = Instant::now();

    let sampler = ParticulateSampler::new(
        config.sensors.window_capacity,
        config.sensors.window_points,
        secs(config.sensors.warmup_secs),
        started,
    );
    let spawned = serial::spawn_pms_reader(
        PathBuf::from(&config.sensors.pms_device),
        sampler,
        tx.clone(),
    )
    .and_then(|()| {
        if config.sensors.gas_enabled {
            gas_sampler::spawn_gas_sampler(
                PathBuf::from(&config.sensors.gas_adc_path),
                tx.clone(),
            )
        } else {
            Ok(())
        }
    })
    .and_then(|()| {
        link::spawn_link_watcher(
            config.network.route_check_addr.clone(),
            secs(config.network.link_check_interval_secs),
            tx.clone(),
        )
    });
    if let Err(e) = spawned {
        error!("Falha ao criar threads dos sensores: {e}");
        return ExitCode::FAILURE;
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌫  AIRNODE AGENT – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Nó:          {} ({hardware_id})", config.node.name);
    println!("  Broker:      {}:{}", config.broker.host, config.broker.port);
    println!("  Publicação:  {:.1}s", config.broker.publish_interval_secs);
    if config.aggregator.enabled {
        println!(
            "  Agregador:   {} a cada {:.0}s",
            config.aggregator.endpoint, config.aggregator.interval_secs
        );
    } else {
        println!("  Agregador:   desabilitado");
    }
    println!("  PMS7003:     {}", config.sensors.pms_device);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    node.start(Instant::now());
    // `tx` segue vivo aqui, então o canal só fecha junto com o processo.
    dispatch(&mut node, &rx);
    drop(tx);
    info!("Dispatcher encerrado");
    ExitCode::SUCCESS
}

/// Entrega eventos ao nó e dispara os timers vencidos.
fn dispatch(node: &mut Node, rx: &Receiver<NodeEvent>) {
    loop {
        let received = match node.next_deadline() {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(event) => node.handle(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        for outcome in node.poll_timers(Instant::now()) {
            debug!("Ciclo: {outcome:?}");
        }
    }
}
