//! Sessão única de envio ao agregador.
//!
//! Cada ciclo cria uma [`AggregatorReportSession`], que monta a mensagem a
//! partir do [`SensorState`], é entregue a uma conexão de stream, espera uma
//! única linha de confirmação e termina. Toda falha encerra só o ciclo
//! atual; a própria cadência é o único retry.

use crate::protocol::{ACK, LabeledValue, ProtocolError, Report, encode_report};
use crate::state::SensorState;
use crate::types::GasKind;
use std::io;
use tracing::{debug, info, warn};

/// Identificação do nó e destino dos relatórios.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportIdentity {
    /// Endereço de hardware (MAC)
    pub hardware_id: String,
    pub node_id: String,
    /// `host:porta` do agregador
    pub endpoint: String,
    pub methane_label: String,
    pub volatile_label: String,
}

/// Modos de falha de um ciclo de relatório.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Dispositivo offline, relatório pulado")]
    Offline,

    #[error("Sem dados para enviar")]
    NothingToReport,

    #[error("Mensagem inválida: {0}")]
    Encode(#[from] ProtocolError),

    #[error("{endpoint}: erro de conexão ({reason})")]
    Transport { endpoint: String, reason: String },

    #[error("{endpoint}: resposta inesperada {payload:?}")]
    Protocol { endpoint: String, payload: String },
}

/// Entrega confirmada pelo agregador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub endpoint: String,
    pub bytes_sent: usize,
}

/// Conexão de stream usada pela sessão.
///
/// O modelo de buffer é o de um mbuf: `recv` acrescenta bytes ao buffer
/// interno, `pending` expõe o que ainda não foi descartado e `discard`
/// consome exatamente `n` bytes.
pub trait Connection {
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Lê mais dados para o buffer. `Ok(0)` = o peer fechou.
    fn recv(&mut self) -> io::Result<usize>;

    fn pending(&self) -> &[u8];

    fn discard(&mut self, n: usize);

    fn close(&mut self);
}

/// Veredito sobre um bloco recebido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataVerdict {
    Acknowledged,
    Unexpected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Sent,
    Acknowledged,
}

#[derive(Debug)]
pub struct AggregatorReportSession {
    endpoint: String,
    payload: String,
    phase: Phase,
    /// Último conteúdo inesperado recebido
    unexpected: Option<String>,
}

impl AggregatorReportSession {
    /// Monta o relatório a partir do estado atual.
    pub fn build_report(state: &SensorState, identity: &ReportIdentity) -> Report {
        let labeled = |kind: GasKind, label: &str| {
            state.gas(kind).map(|value| LabeledValue {
                value,
                label: label.into(),
            })
        };

        Report {
            hardware_id: identity.hardware_id.clone(),
            node_id: identity.node_id.clone(),
            particulate: state.particulate(),
            methane: labeled(GasKind::Methane, &identity.methane_label),
            volatile: labeled(GasKind::Volatile, &identity.volatile_label),
        }
    }

    /// Porta de conectividade + montagem do payload.
    ///
    /// Não abre conexão: offline ou sem dados o ciclo termina aqui.
    pub fn prepare(state: &SensorState, identity: &ReportIdentity) -> Result<Self, SessionError> {
        if !state.is_connected() {
            return Err(SessionError::Offline);
        }

        let report = Self::build_report(state, identity);
        if report.is_empty() {
            return Err(SessionError::NothingToReport);
        }

        Ok(Self {
            endpoint: identity.endpoint.clone(),
            payload: encode_report(&report)?,
            phase: Phase::Pending,
            unexpected: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn is_acknowledged(&self) -> bool {
        self.phase == Phase::Acknowledged
    }

    /// Conexão estabelecida: transmite a mensagem inteira uma vez.
    pub fn on_connect(&mut self, conn: &mut (impl Connection + ?Sized)) -> Result<usize, SessionError> {
        if self.phase != Phase::Pending {
            return Ok(0);
        }
        conn.send(self.payload.as_bytes())
            .map_err(|e| self.on_error(&e.to_string()))?;
        self.phase = Phase::Sent;
        debug!("{} bytes enviados para {}", self.payload.len(), self.endpoint);
        Ok(self.payload.len())
    }

    /// Classifica um bloco recebido. Só `OK\n` exato confirma.
    pub fn on_data(&mut self, data: &[u8]) -> DataVerdict {
        if data == ACK {
            self.phase = Phase::Acknowledged;
            DataVerdict::Acknowledged
        } else {
            self.unexpected = Some(String::from_utf8_lossy(data).into_owned());
            DataVerdict::Unexpected
        }
    }

    /// Falha de transporte (connect ou I/O).
    pub fn on_error(&self, reason: &str) -> SessionError {
        SessionError::Transport {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
    }

    /// Resultado final quando a conexão termina sem confirmação.
    fn unconfirmed(&self, reason: &str) -> SessionError {
        match &self.unexpected {
            Some(payload) => SessionError::Protocol {
                endpoint: self.endpoint.clone(),
                payload: payload.clone(),
            },
            None => self.on_error(reason),
        }
    }
}

/// Executa a troca completa sobre uma conexão já aberta.
///
/// Cada bloco recebido é comparado com a confirmação e exatamente a
/// quantidade recebida é descartada. Com a confirmação a conexão é fechada.
/// Depois de uma resposta inesperada a conexão continua aberta até o peer
/// fechar ou o transporte estourar o timeout; então ela é fechada aqui.
pub fn drive<C: Connection + ?Sized>(
    mut session: AggregatorReportSession,
    conn: &mut C,
) -> Result<Delivery, SessionError> {
    let bytes_sent = match session.on_connect(conn) {
        Ok(n) => n,
        Err(e) => {
            conn.close();
            return Err(e);
        }
    };

    loop {
        match conn.recv() {
            Ok(0) => {
                conn.close();
                return Err(session.unconfirmed("conexão fechada sem confirmação"));
            }
            Ok(_) => {
                let received = conn.pending().len();
                let verdict = session.on_data(conn.pending());
                if verdict == DataVerdict::Acknowledged {
                    conn.close();
                }
                conn.discard(received);
                if verdict == DataVerdict::Acknowledged {
                    return Ok(Delivery {
                        endpoint: session.endpoint,
                        bytes_sent,
                    });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                conn.close();
                return Err(session.unconfirmed(&e.to_string()));
            }
        }
    }
}

/// Registra o resultado de um ciclo: exatamente uma linha por desfecho.
pub fn log_outcome(outcome: &Result<Delivery, SessionError>) {
    match outcome {
        Ok(delivery) => info!("Relatório enviado para {} ok!", delivery.endpoint),
        Err(e @ (SessionError::Offline | SessionError::NothingToReport)) => info!("Agregador: {e}"),
        Err(e) => warn!("Agregador: {e}"),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticulateAverages;
    use std::collections::VecDeque;

    /// Conexão roteirizada: cada item é o resultado de um `recv`.
    #[derive(Default)]
    struct ScriptedConnection {
        script: VecDeque<io::Result<Vec<u8>>>,
        buffer: Vec<u8>,
        sent: Vec<u8>,
        discarded: usize,
        closed: bool,
        fail_send: bool,
    }

    impl ScriptedConnection {
        fn replying(chunks: &[&[u8]]) -> Self {
            Self {
                script: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
                ..Default::default()
            }
        }
    }

    impl Connection for ScriptedConnection {
        fn send(&mut self, data: &[u8]) -> io::Result<()> {
            if self.fail_send {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.sent.extend_from_slice(data);
            Ok(())
        }

        fn recv(&mut self) -> io::Result<usize> {
            match self.script.pop_front() {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }

        fn pending(&self) -> &[u8] {
            &self.buffer
        }

        fn discard(&mut self, n: usize) {
            self.buffer.drain(..n.min(self.buffer.len()));
            self.discarded += n;
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn identity() -> ReportIdentity {
        ReportIdentity {
            hardware_id: "AA:BB:CC:DD:EE:FF".into(),
            node_id: "node7".into(),
            endpoint: "aggregator.test:8283".into(),
            methane_label: "Hot (MQ7)".into(),
            volatile_label: "VOC (MQ7)".into(),
        }
    }

    fn online_state() -> SensorState {
        let mut state = SensorState::new();
        state.set_connected(true);
        state.set_particulate(ParticulateAverages::from_raw(5.6, -1.0, 12.3));
        state
    }

    #[test]
    fn offline_gate_blocks_before_building() {
        let mut state = online_state();
        state.set_connected(false);
        assert_eq!(
            AggregatorReportSession::prepare(&state, &identity()).unwrap_err(),
            SessionError::Offline
        );
    }

    #[test]
    fn nothing_valid_means_no_session() {
        let mut state = SensorState::new();
        state.set_connected(true);
        assert_eq!(
            AggregatorReportSession::prepare(&state, &identity()).unwrap_err(),
            SessionError::NothingToReport
        );
    }

    #[test]
    fn gas_alone_is_worth_sending() {
        let mut state = SensorState::new();
        state.set_connected(true);
        state.update_gas(GasKind::Volatile, 0.0);
        let session = AggregatorReportSession::prepare(&state, &identity()).unwrap();
        assert_eq!(session.payload(), "#AA:BB:CC:DD:EE:FF#node7\n#LO#0#VOC (MQ7)\n##");
    }

    #[test]
    fn payload_matches_wire_grammar() {
        let session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        assert_eq!(
            session.payload(),
            "#AA:BB:CC:DD:EE:FF#node7\n#PM1_0#5.6#PM1\n#PM10_0#12.3#PM10\n##"
        );
        assert_eq!(session.endpoint(), "aggregator.test:8283");
    }

    #[test]
    fn ok_closes_and_discards() {
        let session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        let payload = session.payload().to_string();
        let mut conn = ScriptedConnection::replying(&[b"OK\n"]);

        let delivery = drive(session, &mut conn).unwrap();
        assert_eq!(delivery.bytes_sent, payload.len());
        assert_eq!(conn.sent, payload.as_bytes());
        assert!(conn.closed);
        assert_eq!(conn.discarded, 3);
        assert!(conn.pending().is_empty());
    }

    #[test]
    fn err_reply_keeps_reading_then_reports_protocol_error() {
        let session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        let mut conn = ScriptedConnection::replying(&[b"ERR\n", b"more"]);

        let err = drive(session, &mut conn).unwrap_err();
        assert_eq!(
            err,
            SessionError::Protocol {
                endpoint: "aggregator.test:8283".into(),
                payload: "more".into(),
            }
        );
        // Descartou exatamente o que chegou, em dois blocos
        assert_eq!(conn.discarded, 8);
        assert!(conn.closed);
    }

    #[test]
    fn session_stays_open_after_unexpected_reply() {
        let mut session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        let mut conn = ScriptedConnection::default();
        session.on_connect(&mut conn).unwrap();
        assert_eq!(session.on_data(b"ERR\n"), DataVerdict::Unexpected);
        assert!(!session.is_acknowledged());
        assert!(!conn.closed);
        assert_eq!(session.on_data(b"OK\n"), DataVerdict::Acknowledged);
    }

    #[test]
    fn split_ack_is_not_an_ack() {
        let session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        let mut conn = ScriptedConnection::replying(&[b"OK", b"\n"]);
        assert!(matches!(drive(session, &mut conn), Err(SessionError::Protocol { .. })));
    }

    #[test]
    fn timeout_without_reply_is_transport_error() {
        let session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        let mut conn = ScriptedConnection {
            script: VecDeque::from([Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))]),
            ..Default::default()
        };
        assert!(matches!(
            drive(session, &mut conn),
            Err(SessionError::Transport { .. })
        ));
        assert!(conn.closed);
    }

    #[test]
    fn send_failure_is_transport_error() {
        let session = AggregatorReportSession::prepare(&online_state(), &identity()).unwrap();
        let mut conn = ScriptedConnection {
            fail_send: true,
            ..Default::default()
        };
        let err = drive(session, &mut conn).unwrap_err();
        assert!(matches!(err, SessionError::Transport { reason, .. } if reason.contains("broken pipe")));
        assert!(conn.closed);
    }
}
