use parking_lot::Mutex;
use serde::Serialize;

/// Generation number handed out when a refresh begins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refresh {ticket} superseded by #{latest}")]
pub struct Superseded {
    pub ticket: Ticket,
    pub latest: u64,
}

#[derive(Debug, Default)]
struct GateState {
    latest_begun: u64,
    last_published: u64,
}

/// Last-writer-wins arbitration between overlapping refreshes.
///
/// Only the most recently begun refresh may publish, and never behind a
/// generation that already has. Work started for an older viewport is
/// dropped as soon as a newer one begins.
#[derive(Debug, Default)]
pub struct GenerationGate {
    state: Mutex<GateState>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        let mut state = self.state.lock();
        state.latest_begun += 1;
        Ticket(state.latest_begun)
    }

    /// Fails fast for work that can no longer publish.
    pub fn check(&self, ticket: Ticket) -> Result<(), Superseded> {
        let state = self.state.lock();
        if ticket.0 == state.latest_begun {
            Ok(())
        } else {
            Err(Superseded {
                ticket,
                latest: state.latest_begun,
            })
        }
    }

    pub fn last_published(&self) -> Option<u64> {
        let published = self.state.lock().last_published;
        (published > 0).then_some(published)
    }

    /// Runs `deliver` inside the gate if `ticket` may still publish.
    ///
    /// The check and the delivery share one critical section, so a newer
    /// refresh cannot begin between them.
    pub fn publish<T>(&self, ticket: Ticket, deliver: impl FnOnce() -> T) -> Result<T, Superseded> {
        let mut state = self.state.lock();
        if ticket.0 != state.latest_begun || ticket.0 <= state.last_published {
            return Err(Superseded {
                ticket,
                latest: state.latest_begun,
            });
        }
        state.last_published = ticket.0;
        Ok(deliver())
    }
}
