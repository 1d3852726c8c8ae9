//! Contexto único do nó e despacho de eventos.
//!
//! O [`Node`] é dono de todo o estado mutável e é o único escritor. Ordem
//! de inicialização: configuração → [`SensorState`] → [`ConnectivityGate`] →
//! [`PeriodicPublisher`] → timers ([`Node::start`]). Não há teardown: o nó
//! vive até o processo terminar.
//!
//! Eventos de uma mesma fonte são processados na ordem de chegada. As duas
//! rotas de relatório (broker e agregador) rodam em cadências independentes
//! e leem o estado "melhor esforço atual", sem snapshot entre métricas.

use crate::config::NodeSettings;
use crate::connectivity::{ConnectivityGate, LinkState, NetworkEvent};
use crate::display::ReadingsView;
use crate::gas::{GasEvent, GasEventTracker, GasUpdate};
use crate::outputs::{Broker, Indicator, StatusDisplay};
use crate::particulate::ParticulateReading;
use crate::publisher::{PeriodicPublisher, PublishOutcome};
use crate::schedule::{TimerMode, TimerService};
use crate::session::{AggregatorReportSession, SessionError, log_outcome};
use crate::state::SensorState;
use crate::types::GasKind;
use std::time::Instant;
use tracing::info;

/// Evento vindo de uma fonte externa (drivers, pilha de rede).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeEvent {
    /// Novas médias calculadas pelo driver de particulado
    Particulate(ParticulateReading),
    Gas(GasEvent),
    Network(NetworkEvent),
}

/// Timers do nó.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTimer {
    /// Cadência C1 do broker
    Publish,
    /// Fim do aquecimento W: arma a cadência do agregador
    AggregatorWarmup,
    /// Cadência C2 do agregador
    AggregatorReport,
}

/// Inicia a troca de uma sessão com o agregador (tipicamente em outra
/// thread). A sessão passa a pertencer ao lançador.
pub trait SessionLauncher {
    fn launch(&mut self, session: AggregatorReportSession);
}

/// Resultado de um disparo de timer.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Publish(PublishOutcome),
    ReportsArmed,
    /// Sessão entregue ao lançador
    ReportLaunched,
    /// Ciclo encerrado antes de abrir conexão
    ReportSkipped(SessionError),
}

/// Colaboradores concretos injetados no nó.
pub struct Collaborators {
    pub broker: Box<dyn Broker>,
    pub indicator: Box<dyn Indicator>,
    pub display: Box<dyn StatusDisplay>,
    pub launcher: Box<dyn SessionLauncher>,
}

pub struct Node {
    settings: NodeSettings,
    state: SensorState,
    gate: ConnectivityGate,
    tracker: GasEventTracker,
    publisher: PeriodicPublisher,
    timers: TimerService<NodeTimer>,
    view: ReadingsView,
    io: Collaborators,
}

impl Node {
    pub fn new(settings: NodeSettings, io: Collaborators) -> Self {
        let state = SensorState::new();
        let gate = ConnectivityGate::new(settings.node_id.clone());
        let publisher = PeriodicPublisher::new(settings.node_id.clone());
        Self {
            settings,
            state,
            gate,
            tracker: GasEventTracker,
            publisher,
            timers: TimerService::new(),
            view: ReadingsView::default(),
            io,
        }
    }

    /// Arma a cadência do broker e o aquecimento do agregador.
    pub fn start(&mut self, now: Instant) {
        self.timers.schedule(
            now,
            self.settings.publish_interval,
            TimerMode::Repeat,
            NodeTimer::Publish,
        );
        if let Some(agg) = &self.settings.aggregator {
            self.timers
                .schedule(now, agg.warmup, TimerMode::Once, NodeTimer::AggregatorWarmup);
            info!(
                "Agregador {} em {:.0}s, depois a cada {:.0}s",
                agg.identity.endpoint,
                agg.warmup.as_secs_f64(),
                agg.interval.as_secs_f64()
            );
        }
    }

    pub fn state(&self) -> &SensorState {
        &self.state
    }

    pub fn link_state(&self) -> LinkState {
        self.gate.state()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn handle(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Particulate(reading) => {
                self.state.set_particulate(reading.averages);
                self.view.update_particulate(&reading);
            }
            NodeEvent::Gas(gas) => match self.tracker.apply(&mut self.state, gas) {
                GasUpdate::Stored(GasKind::Volatile, value) => {
                    self.view.volatile = Some(value);
                    self.publisher.publish_volatile(
                        value,
                        self.io.broker.as_mut(),
                        self.io.indicator.as_mut(),
                    );
                }
                GasUpdate::Stored(GasKind::Methane, _) => {}
                GasUpdate::Cleared => self.view.volatile = None,
            },
            NodeEvent::Network(net) => {
                let changed = self.gate.handle(
                    net,
                    &mut self.state,
                    self.io.broker.as_mut(),
                    self.io.indicator.as_mut(),
                    self.io.display.as_mut(),
                );
                if !changed {
                    return;
                }
                self.view.status = self.gate.state();
            }
        }
        self.io.display.show_readings(&self.view);
    }

    /// Executa todos os timers vencidos em `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::new();
        // Um timer armado durante o despacho (RUN_NOW) também vence agora.
        loop {
            let due = self.timers.expired(now);
            if due.is_empty() {
                break;
            }
            for timer in due {
                outcomes.push(self.on_timer(timer, now));
            }
        }
        outcomes
    }

    fn on_timer(&mut self, timer: NodeTimer, now: Instant) -> CycleOutcome {
        match timer {
            NodeTimer::Publish => CycleOutcome::Publish(self.publisher.run_cycle(
                &self.state,
                self.io.broker.as_mut(),
                self.io.indicator.as_mut(),
            )),
            NodeTimer::AggregatorWarmup => {
                if let Some(agg) = &self.settings.aggregator {
                    info!(
                        "Timer do agregador iniciado, MAC do dispositivo: {}",
                        agg.identity.hardware_id
                    );
                    self.timers.schedule(
                        now,
                        agg.interval,
                        TimerMode::RepeatRunNow,
                        NodeTimer::AggregatorReport,
                    );
                }
                CycleOutcome::ReportsArmed
            }
            NodeTimer::AggregatorReport => self.report_cycle(),
        }
    }

    fn report_cycle(&mut self) -> CycleOutcome {
        let Some(agg) = &self.settings.aggregator else {
            return CycleOutcome::ReportSkipped(SessionError::Offline);
        };

        match AggregatorReportSession::prepare(&self.state, &agg.identity) {
            Ok(session) => {
                self.io.indicator.toggle();
                self.io.launcher.launch(session);
                self.io.indicator.toggle();
                CycleOutcome::ReportLaunched
            }
            Err(e) => {
                log_outcome(&Err(e.clone()));
                CycleOutcome::ReportSkipped(e)
            }
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
