use std::collections::VecDeque;
use std::sync::Arc;

use compute::{HeightProfile, MeshReport};
use foundation::ids::{AreaName, MeshId};
use serde::Serialize;

/// East-west and north-south side views of the current mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profiles {
    pub east_west: HeightProfile,
    pub north_south: HeightProfile,
}

/// One published refresh: everything a view needs to redraw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshEvent {
    pub generation: u64,
    /// Viewport center as `[lon, lat]`.
    pub center: [f64; 2],
    /// Survey area whose trees were loaded when the event was built.
    pub area: Option<AreaName>,
    pub report: Arc<MeshReport>,
    /// `None` when the center is outside every mesh.
    pub profiles: Option<Profiles>,
}

impl RefreshEvent {
    pub fn mesh_id(&self) -> Option<&MeshId> {
        self.report.outcome.mesh().map(|m| &m.id)
    }
}

/// A view that redraws on refresh.
pub trait Subscriber: Send {
    fn name(&self) -> &str {
        "subscriber"
    }

    fn on_refresh(&mut self, event: &RefreshEvent);
}

/// Record of one delivery, kept for traceability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub generation: u64,
    pub mesh: Option<MeshId>,
    pub subscribers: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event #{generation} is not newer than delivered #{last}")]
pub struct StaleEvent {
    pub generation: u64,
    pub last: u64,
}

/// Deliveries kept before the oldest are discarded.
pub const DELIVERY_LOG_CAP: usize = 256;

/// Fans refresh events out to subscribers in registration order.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Box<dyn Subscriber>>,
    last_generation: Option<u64>,
    deliveries: VecDeque<Delivery>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        tracing::debug!(name = subscriber.name(), "subscriber registered");
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn last_generation(&self) -> Option<u64> {
        self.last_generation
    }

    pub fn deliver(&mut self, event: &RefreshEvent) -> Result<(), StaleEvent> {
        if let Some(last) = self.last_generation
            && event.generation <= last
        {
            return Err(StaleEvent {
                generation: event.generation,
                last,
            });
        }
        for s in &mut self.subscribers {
            s.on_refresh(event);
        }
        self.last_generation = Some(event.generation);
        if self.deliveries.len() == DELIVERY_LOG_CAP {
            self.deliveries.pop_front();
        }
        self.deliveries.push_back(Delivery {
            generation: event.generation,
            mesh: event.mesh_id().cloned(),
            subscribers: self.subscribers.len(),
        });
        Ok(())
    }

    /// Most recent deliveries, oldest first, at most [`DELIVERY_LOG_CAP`].
    pub fn deliveries(&self) -> impl ExactSizeIterator<Item = &Delivery> {
        self.deliveries.iter()
    }

    pub fn drain(&mut self) -> Vec<Delivery> {
        self.deliveries.drain(..).collect()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("EventBus")
            .field("subscribers", &names)
            .field("last_generation", &self.last_generation)
            .field("deliveries", &self.deliveries.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{RefreshEvent, Subscriber};

    /// Records delivered generations into a shared log.
    pub struct Recorder {
        pub label: &'static str,
        pub log: Arc<Mutex<Vec<(&'static str, u64)>>>,
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn on_refresh(&mut self, event: &RefreshEvent) {
            self.log.lock().push((self.label, event.generation));
        }
    }
}
