use std::sync::Arc;

use geo::Point;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::area::{AreaTracker, SourceError, TreeSource};
use crate::event_bus::RefreshEvent;
use crate::generation::{GenerationGate, Superseded, Ticket};
use crate::metrics::{self, Metrics};
use crate::pipeline::{LoadedTrees, SurveyContext, reload_for};

pub type LatestEvent = Option<Arc<RefreshEvent>>;

#[derive(Debug, thiserror::Error)]
pub enum RefresherError {
    #[error("refresher needs a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[error("refresh task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Published(Arc<RefreshEvent>),
    Superseded(Superseded),
    Failed(SourceError),
}

/// A refresh in flight.
#[derive(Debug)]
pub struct PendingRefresh {
    pub ticket: Ticket,
    task: JoinHandle<RefreshOutcome>,
}

impl PendingRefresh {
    pub async fn outcome(self) -> Result<RefreshOutcome, RefresherError> {
        Ok(self.task.await?)
    }
}

struct Shared<S> {
    context: SurveyContext,
    tracker: AreaTracker,
    source: S,
    gate: GenerationGate,
    loaded: RwLock<LoadedTrees>,
    latest: watch::Sender<LatestEvent>,
    metrics: Mutex<Metrics>,
}

impl<S: TreeSource> Shared<S> {
    fn run(&self, ticket: Ticket, center: Point<f64>) -> RefreshOutcome {
        if let Err(superseded) = self.gate.check(ticket) {
            return self.drop_superseded(superseded);
        }

        let current = self.loaded.read().clone();
        let fresh = match reload_for(&self.tracker, &self.source, current.area.as_ref(), center) {
            Ok(fresh) => fresh,
            Err(err) => {
                self.metrics.lock().inc(metrics::LOAD_ERRORS);
                tracing::warn!(%ticket, %err, "tree load failed; keeping previous area");
                return RefreshOutcome::Failed(err);
            }
        };

        let view = fresh.as_ref().unwrap_or(&current);
        let event = Arc::new(
            self.context.evaluate(ticket, center, view.area.clone(), &view.trees),
        );
        // Freshly loaded trees are committed with the event, never on their own.
        let published = self.gate.publish(ticket, || {
            if let Some(fresh) = fresh {
                self.metrics.lock().inc(metrics::TREE_RELOADS);
                *self.loaded.write() = fresh;
            }
            self.latest.send_replace(Some(event.clone()))
        });
        match published {
            Ok(_) => {
                self.metrics.lock().inc(metrics::PUBLISHED);
                tracing::debug!(%ticket, mesh = ?event.mesh_id(), "refresh published");
                RefreshOutcome::Published(event)
            }
            Err(superseded) => self.drop_superseded(superseded),
        }
    }

    fn drop_superseded(&self, superseded: Superseded) -> RefreshOutcome {
        self.metrics.lock().inc(metrics::SUPERSEDED);
        tracing::debug!(%superseded, "dropping refresh");
        RefreshOutcome::Superseded(superseded)
    }
}

/// Background viewport refresh on tokio's blocking pool.
///
/// Requests return at once; the newest published event is observable on a
/// `watch` channel. Results of superseded requests are counted and dropped.
pub struct Refresher<S> {
    shared: Arc<Shared<S>>,
    runtime: Handle,
    events: watch::Receiver<LatestEvent>,
}

impl<S: TreeSource + 'static> Refresher<S> {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        context: SurveyContext,
        tracker: AreaTracker,
        source: S,
    ) -> Result<Self, RefresherError> {
        let runtime = Handle::try_current()?;
        let (latest, events) = watch::channel(None);
        Ok(Self {
            shared: Arc::new(Shared {
                context,
                tracker,
                source,
                gate: GenerationGate::new(),
                loaded: RwLock::new(LoadedTrees::default()),
                latest,
                metrics: Mutex::new(Metrics::new()),
            }),
            runtime,
            events,
        })
    }

    pub fn request(&self, center: Point<f64>) -> PendingRefresh {
        let ticket = self.shared.gate.begin();
        let shared = Arc::clone(&self.shared);
        let task = self
            .runtime
            .spawn_blocking(move || shared.run(ticket, center));
        PendingRefresh { ticket, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<LatestEvent> {
        self.events.clone()
    }

    pub fn latest(&self) -> LatestEvent {
        self.events.borrow().clone()
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use foundation::ids::AreaName;
    use formats::IngestReport;
    use geo::Point;
    use parking_lot::Mutex;

    use super::{RefreshOutcome, Refresher, RefresherError};
    use crate::area::{AreaTracker, SourceError, TreeSource};
    use crate::metrics;
    use crate::pipeline::test_support::{MemorySource, context};

    /// Blocks the first load of area `A` until released.
    struct GatedSource {
        release: Mutex<Option<mpsc::Receiver<()>>>,
        inner: MemorySource,
    }

    impl GatedSource {
        fn new() -> (Self, mpsc::Sender<()>) {
            let (release, rx) = mpsc::channel();
            let source = Self {
                release: Mutex::new(Some(rx)),
                inner: MemorySource::two_areas(),
            };
            (source, release)
        }
    }

    impl TreeSource for GatedSource {
        fn load(&self, area: &AreaName) -> Result<IngestReport, SourceError> {
            if area.as_str() == "A" {
                let gate = self.release.lock().take();
                if let Some(rx) = gate {
                    let _ = rx.recv();
                }
            }
            self.inner.load(area)
        }
    }

    fn area_of(outcome: RefreshOutcome) -> Option<String> {
        match outcome {
            RefreshOutcome::Published(event) => event.area.as_ref().map(ToString::to_string),
            other => panic!("expected a published refresh, got {other:?}"),
        }
    }

    fn refresher<S: TreeSource + 'static>(source: S) -> Refresher<S> {
        let ctx = context();
        let tracker = AreaTracker::new(ctx.areas().clone(), 0.0);
        Refresher::spawn(ctx, tracker, source).unwrap()
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        let ctx = context();
        let tracker = AreaTracker::new(ctx.areas().clone(), 0.0);
        let err = Refresher::spawn(ctx, tracker, MemorySource::two_areas()).err();
        assert!(matches!(err, Some(RefresherError::NoRuntime(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn publishes_to_watch_channel() {
        let r = refresher(MemorySource::two_areas());
        let mut rx = r.subscribe();

        let pending = r.request(Point::new(0.0005, 0.0005));
        let ticket = pending.ticket;
        assert!(matches!(pending.outcome().await.unwrap(), RefreshOutcome::Published(_)));

        rx.changed().await.unwrap();
        let latest = rx.borrow().clone().unwrap();
        assert_eq!(latest.generation, ticket.generation());
        assert_eq!(latest.area.as_ref().map(|a| a.as_str()), Some("A"));
        assert_eq!(latest.report.trees.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn superseded_result_never_overwrites_newer_one() {
        let (source, release) = GatedSource::new();
        let r = refresher(source);

        // Stalls loading area A.
        let slow = r.request(Point::new(0.0005, 0.0005));
        // Outside every area: no load, publishes right away.
        let fast = r.request(Point::new(0.5, 0.5));
        let fast_ticket = fast.ticket;

        assert!(matches!(fast.outcome().await.unwrap(), RefreshOutcome::Published(_)));
        let _ = release.send(());
        assert!(matches!(slow.outcome().await.unwrap(), RefreshOutcome::Superseded(_)));

        let latest = r.latest().unwrap();
        assert_eq!(latest.generation, fast_ticket.generation());
        let m = r.metrics();
        assert_eq!(m.counter(metrics::PUBLISHED), 1);
        assert_eq!(m.counter(metrics::SUPERSEDED), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn load_failure_is_reported_and_publishes_nothing() {
        let r = refresher(MemorySource::two_areas());
        let pending = r.request(Point::new(0.025, 0.0005));
        assert!(matches!(pending.outcome().await.unwrap(), RefreshOutcome::Failed(_)));
        assert!(r.latest().is_none());
        assert_eq!(r.metrics().counter(metrics::LOAD_ERRORS), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn superseded_load_does_not_replace_current_area() {
        let (source, release) = GatedSource::new();
        let r = refresher(source);

        let slow = r.request(Point::new(0.0005, 0.0005));
        let b = r.request(Point::new(0.0105, 0.0005));
        assert_eq!(area_of(b.outcome().await.unwrap()), Some("B".to_string()));

        let _ = release.send(());
        assert!(matches!(slow.outcome().await.unwrap(), RefreshOutcome::Superseded(_)));

        // Outside every area: the trees of the last published area stay.
        let after = r.request(Point::new(0.5, 0.5));
        assert_eq!(area_of(after.outcome().await.unwrap()), Some("B".to_string()));
        assert_eq!(r.metrics().counter(metrics::TREE_RELOADS), 1);
    }
}
