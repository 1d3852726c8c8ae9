//! Transporte TCP das sessões com o agregador.
//!
//! Cada sessão roda numa thread curta que é dona da conexão: conecta,
//! executa [`drive`] e registra o desfecho. A conexão sempre é fechada
//! explicitamente, inclusive após timeout esperando a confirmação.
//!
//! O timeout vale para a sessão inteira: um peer que continua mandando
//! dados sem confirmar não estende o prazo.

use airnode_core::node::SessionLauncher;
use airnode_core::session::{
    AggregatorReportSession, Connection, Delivery, SessionError, drive, log_outcome,
};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, error};

const READ_CHUNK: usize = 512;

/// Conexão TCP com buffer de recepção no modelo mbuf.
pub struct TcpConnection {
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
    /// Prazo final para a troca toda
    deadline: Instant,
}

impl TcpConnection {
    /// Resolve `host:porta` e conecta no primeiro endereço que aceitar.
    ///
    /// `timeout` limita cada tentativa de conexão e, depois de conectado,
    /// toda a troca até a confirmação.
    pub fn connect(endpoint: &str, timeout: Duration) -> io::Result<Self> {
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "endereço não resolvido");
        for addr in endpoint.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    debug!("Conectado a {endpoint} ({addr})");
                    return Ok(Self {
                        stream: Some(stream),
                        buffer: Vec::new(),
                        deadline: Instant::now() + timeout,
                    });
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "conexão fechada"))
    }

    /// Tempo restante até o prazo da sessão.
    fn remaining(&self) -> io::Result<Duration> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "prazo da confirmação esgotado",
            ));
        }
        Ok(left)
    }
}

impl Connection for TcpConnection {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let left = self.remaining()?;
        let stream = self.stream()?;
        stream.set_write_timeout(Some(left))?;
        stream.write_all(data)?;
        stream.flush()
    }

    fn recv(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let left = self.remaining()?;
        let stream = self.stream()?;
        stream.set_read_timeout(Some(left))?;
        let n = stream.read(&mut chunk)?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn pending(&self) -> &[u8] {
        &self.buffer
    }

    fn discard(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n);
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Executa uma sessão completa de forma bloqueante.
pub fn run_session(
    session: AggregatorReportSession,
    timeout: Duration,
) -> Result<Delivery, SessionError> {
    match TcpConnection::connect(session.endpoint(), timeout) {
        Ok(mut conn) => drive(session, &mut conn),
        Err(e) => Err(session.on_error(&e.to_string())),
    }
}

/// Lança cada sessão numa thread própria.
pub struct TcpLauncher {
    timeout: Duration,
}

impl TcpLauncher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SessionLauncher for TcpLauncher {
    fn launch(&mut self, session: AggregatorReportSession) {
        let timeout = self.timeout;
        let spawned = std::thread::Builder::new()
            .name("aggregator-session".into())
            .spawn(move || log_outcome(&run_session(session, timeout)));
        if let Err(e) = spawned {
            error!("Falha ao criar thread da sessão: {e}");
        }
    }
}

// ──────────────────────────────────────────────
// Testes (loopback)
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use airnode_core::decode_report;
    use airnode_core::session::ReportIdentity;
    use airnode_core::state::SensorState;
    use airnode_core::types::ParticulateAverages;
    use std::net::TcpListener;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn session_for(endpoint: String) -> AggregatorReportSession {
        let mut state = SensorState::new();
        state.set_connected(true);
        state.set_particulate(ParticulateAverages::from_raw(5.6, -1.0, 12.3));
        let identity = ReportIdentity {
            hardware_id: "AA-BB-CC-DD-EE-FF".into(),
            node_id: "node7".into(),
            endpoint,
            methane_label: "HI".into(),
            volatile_label: "LO".into(),
        };
        AggregatorReportSession::prepare(&state, &identity).unwrap()
    }

    /// Agregador falso: lê a mensagem até `##`, responde e devolve o que leu.
    fn fake_aggregator(reply: &'static [u8]) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut message = Vec::new();
            let mut chunk = [0u8; 64];
            // A mensagem termina em `##` sem quebra de linha
            while !message.ends_with(b"##") {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                message.extend_from_slice(&chunk[..n]);
            }
            stream.write_all(reply).unwrap();
            // Segura a conexão aberta até o cliente fechar
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest);
            String::from_utf8(message).unwrap()
        });
        (endpoint, handle)
    }

    #[test]
    fn acknowledged_report_over_loopback() {
        let (endpoint, server) = fake_aggregator(b"OK\n");
        let delivery = run_session(session_for(endpoint.clone()), TIMEOUT).unwrap();
        assert_eq!(delivery.endpoint, endpoint);

        let received = server.join().unwrap();
        let report = decode_report(&received).unwrap();
        assert_eq!(report.particulate.pm10, Some(12.3));
        assert_eq!(report.particulate.pm1_0, Some(5.6));
        assert_eq!(report.particulate.pm2_5, None);
        assert_eq!(report.node_id, "node7");
    }

    #[test]
    fn error_reply_is_closed_after_timeout() {
        let (endpoint, server) = fake_aggregator(b"ERR\n");
        let err = run_session(session_for(endpoint.clone()), Duration::from_millis(300)).unwrap_err();
        assert_eq!(
            err,
            SessionError::Protocol {
                endpoint,
                payload: "ERR\n".into(),
            }
        );
        // O servidor só termina porque o cliente fechou a conexão
        server.join().unwrap();
    }

    #[test]
    fn chatty_peer_cannot_extend_the_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            // Responde lixo a cada 50ms até o cliente fechar
            for _ in 0..100 {
                if stream.write_all(b"ERR\n").is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(50));
            }
        });

        let started = Instant::now();
        let err = run_session(session_for(endpoint.clone()), Duration::from_millis(300)).unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(1500), "sessão durou {elapsed:?}");
        assert!(matches!(err, SessionError::Protocol { endpoint: e, .. } if e == endpoint));
        server.join().unwrap();
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(
            run_session(session_for(endpoint), TIMEOUT),
            Err(SessionError::Transport { .. })
        ));
    }
}
