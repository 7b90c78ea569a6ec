use std::time::{Duration, Instant};

/// Timed phases of a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Overall exchange, start to end.
    Exchange,
    UdpSocketSetup,
    TcpHandshake,
    TlsHandshake,
    QuicHandshake,
    /// Query send to reply receive.
    Query,
}

/// An optional start/done pair. Unset means the phase never ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    started: Option<Instant>,
    done: Option<Instant>,
}

impl PhaseTiming {
    /// Starting again discards any earlier completion.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.done = None;
    }

    pub fn finish(&mut self) {
        self.finish_at(Instant::now());
    }

    /// Completion observed earlier than the call, e.g. by another task.
    pub fn finish_at(&mut self, at: Instant) {
        self.done = Some(at);
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started
    }

    pub fn done_at(&self) -> Option<Instant> {
        self.done
    }

    pub fn is_complete(&self) -> bool {
        self.started.is_some() && self.done.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.started, self.done) {
            (Some(started), Some(done)) => Some(done.saturating_duration_since(started)),
            _ => None,
        }
    }
}
