//! Serviço de timers com tempo explícito.
//!
//! O dispatcher informa o instante atual; nada aqui lê o relógio, o que
//! torna a cadência testável sem dormir.

use std::time::{Duration, Instant};

/// Modo de disparo de um timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Dispara uma vez após o atraso
    Once,
    /// Dispara a cada período, o primeiro após um período
    Repeat,
    /// Dispara imediatamente e depois a cada período
    RepeatRunNow,
}

#[derive(Debug)]
struct Entry<T> {
    /// Ordem de agendamento, desempata prazos iguais
    seq: u64,
    deadline: Instant,
    period: Option<Duration>,
    token: T,
}

#[derive(Debug)]
pub struct TimerService<T> {
    entries: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for TimerService<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T: Clone> TimerService<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, mode: TimerMode, token: T) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let (deadline, period) = match mode {
            TimerMode::Once => (now + delay, None),
            TimerMode::Repeat => (now + delay, Some(delay)),
            TimerMode::RepeatRunNow => (now, Some(delay)),
        };
        self.entries.push(Entry {
            seq,
            deadline,
            period,
            token,
        });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Retira os timers vencidos em `now`, em ordem de prazo.
    ///
    /// Timers periódicos são reagendados a partir do prazo anterior; se o
    /// dispatcher atrasou vários períodos o timer dispara uma única vez.
    pub fn expired(&mut self, now: Instant) -> Vec<T> {
        let mut due: Vec<(Instant, u64, T)> = Vec::new();

        self.entries.retain_mut(|entry| {
            if entry.deadline > now {
                return true;
            }
            due.push((entry.deadline, entry.seq, entry.token.clone()));
            match entry.period {
                Some(period) if !period.is_zero() => {
                    while entry.deadline <= now {
                        entry.deadline += period;
                    }
                    true
                }
                Some(_) => {
                    entry.deadline = now + Duration::from_millis(1);
                    true
                }
                None => false,
            }
        });

        due.sort_by_key(|(deadline, seq, _)| (*deadline, *seq));
        due.into_iter().map(|(_, _, token)| token).collect()
    }
}
