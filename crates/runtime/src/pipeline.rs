use std::sync::Arc;

use compute::{AggregationConfig, Aggregator, HeightProfile, Resolver};
use foundation::ids::AreaName;
use geo::Point;
use survey::{AreaSet, MeshGrid, TreeSet};

use crate::area::{AreaTracker, SourceError, TreeSource};
use crate::event_bus::{EventBus, Profiles, RefreshEvent, Subscriber};
use crate::generation::{GenerationGate, Ticket};
use crate::metrics::{self, Metrics};

/// Immutable survey inputs shared by every refresh.
#[derive(Debug, Clone)]
pub struct SurveyContext {
    grid: Arc<MeshGrid>,
    areas: Arc<AreaSet>,
    aggregator: Aggregator,
}

impl SurveyContext {
    pub fn new(grid: Arc<MeshGrid>, areas: Arc<AreaSet>, config: AggregationConfig) -> Self {
        Self {
            grid,
            areas,
            aggregator: Aggregator::new(config),
        }
    }

    pub fn grid(&self) -> &MeshGrid {
        &self.grid
    }

    pub fn areas(&self) -> &Arc<AreaSet> {
        &self.areas
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Resolve, aggregate and profile `center` against `trees`.
    pub fn evaluate(
        &self,
        ticket: Ticket,
        center: Point<f64>,
        area: Option<AreaName>,
        trees: &TreeSet,
    ) -> RefreshEvent {
        let resolution = Resolver::new(&self.grid, &self.areas).resolve(center);
        let report = self.aggregator.aggregate(&resolution, trees);
        let profiles = resolution.mesh().map(|mesh| Profiles {
            east_west: HeightProfile::east_west(mesh.bounds(), &report.trees),
            north_south: HeightProfile::north_south(mesh.bounds(), &report.trees),
        });
        RefreshEvent {
            generation: ticket.generation(),
            center: [center.x(), center.y()],
            area,
            report: Arc::new(report),
            profiles,
        }
    }
}

/// Trees currently in memory and the area they were loaded for.
#[derive(Debug, Clone, Default)]
pub struct LoadedTrees {
    pub area: Option<AreaName>,
    pub trees: Arc<TreeSet>,
}

/// Loads the trees for the area under `center` when it differs from
/// `current`. `Ok(None)` keeps what is loaded.
pub(crate) fn reload_for<S: TreeSource + ?Sized>(
    tracker: &AreaTracker,
    source: &S,
    current: Option<&AreaName>,
    center: Point<f64>,
) -> Result<Option<LoadedTrees>, SourceError> {
    let Some(area) = tracker.locate(center) else {
        return Ok(None);
    };
    if current == Some(area) {
        return Ok(None);
    }
    tracing::info!(from = ?current.map(AreaName::as_str), to = %area, "switching survey area");
    let report = source.load(area)?;
    for issue in &report.issues {
        tracing::debug!(%area, %issue, "tree ingestion issue");
    }
    Ok(Some(LoadedTrees {
        area: Some(area.clone()),
        trees: Arc::new(report.trees),
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("loading trees: {0}")]
    Source(#[from] SourceError),
}

/// Single-threaded viewport driver: one refresh per call, published in order.
pub struct ViewportPipeline<S> {
    context: SurveyContext,
    tracker: AreaTracker,
    source: S,
    gate: GenerationGate,
    bus: EventBus,
    loaded: LoadedTrees,
    metrics: Metrics,
}

impl<S: TreeSource> ViewportPipeline<S> {
    pub fn new(context: SurveyContext, tracker: AreaTracker, source: S) -> Self {
        Self {
            context,
            tracker,
            source,
            gate: GenerationGate::new(),
            bus: EventBus::new(),
            loaded: LoadedTrees::default(),
            metrics: Metrics::new(),
        }
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.bus.subscribe(subscriber);
    }

    pub fn active_area(&self) -> Option<&AreaName> {
        self.loaded.area.as_ref()
    }

    pub fn trees(&self) -> &Arc<TreeSet> {
        &self.loaded.trees
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Runs one refresh for `center`.
    ///
    /// On a tree load failure the previous area and trees stay in place and
    /// nothing is published.
    pub fn on_viewport_changed(
        &mut self,
        center: Point<f64>,
    ) -> Result<Option<Arc<RefreshEvent>>, PipelineError> {
        let ticket = self.gate.begin();
        let span = tracing::debug_span!("refresh", generation = ticket.generation());
        let _enter = span.enter();

        match reload_for(&self.tracker, &self.source, self.loaded.area.as_ref(), center) {
            Ok(Some(loaded)) => {
                self.metrics.inc(metrics::TREE_RELOADS);
                self.loaded = loaded;
            }
            Ok(None) => {}
            Err(err) => {
                self.metrics.inc(metrics::LOAD_ERRORS);
                tracing::warn!(%err, "tree load failed; keeping previous area");
                return Err(err.into());
            }
        }

        let event = Arc::new(self.context.evaluate(
            ticket,
            center,
            self.loaded.area.clone(),
            &self.loaded.trees,
        ));

        let bus = &mut self.bus;
        match self.gate.publish(ticket, || bus.deliver(&event)) {
            Ok(Ok(())) => {
                self.metrics.inc(metrics::PUBLISHED);
                Ok(Some(event))
            }
            Ok(Err(stale)) => {
                self.metrics.inc(metrics::SUPERSEDED);
                tracing::warn!(%stale, "bus refused event");
                Ok(None)
            }
            Err(superseded) => {
                self.metrics.inc(metrics::SUPERSEDED);
                tracing::debug!(%superseded, "dropping refresh");
                Ok(None)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use compute::MeshOutcome;
    use geo::Point;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use super::ViewportPipeline;
    use super::test_support::{MemorySource, context};
    use crate::area::AreaTracker;
    use crate::event_bus::test_support::Recorder;
    use crate::metrics;

    fn pipeline() -> ViewportPipeline<MemorySource> {
        let ctx = context();
        let tracker = AreaTracker::new(ctx.areas().clone(), 0.0);
        ViewportPipeline::new(ctx, tracker, MemorySource::two_areas())
    }

    #[test]
    fn switching_area_reloads_trees() {
        let mut p = pipeline();

        let ev = p.on_viewport_changed(Point::new(0.0005, 0.0005)).unwrap().unwrap();
        assert_eq!(ev.area.as_ref().map(|a| a.as_str()), Some("A"));
        assert_eq!(ev.report.outcome.stats().map(|s| s.count), Some(2));

        // Same area: no reload.
        p.on_viewport_changed(Point::new(0.0004, 0.0005)).unwrap();
        assert_eq!(p.source.loads(), 1);

        let ev = p.on_viewport_changed(Point::new(0.0105, 0.0005)).unwrap().unwrap();
        assert_eq!(ev.area.as_ref().map(|a| a.as_str()), Some("B"));
        assert_eq!(ev.report.trees.len(), 1);
        assert_eq!(p.source.loads(), 2);
        assert_eq!(p.trees().len(), 1);
        assert_eq!(p.metrics().counter(metrics::TREE_RELOADS), 2);
    }

    #[test]
    fn load_failure_keeps_previous_state() {
        let mut p = pipeline();
        p.on_viewport_changed(Point::new(0.0005, 0.0005)).unwrap();

        assert!(p.on_viewport_changed(Point::new(0.025, 0.0005)).is_err());
        assert_eq!(p.active_area().map(|a| a.as_str()), Some("A"));
        assert_eq!(p.trees().len(), 2);
        assert_eq!(p.metrics().counter(metrics::LOAD_ERRORS), 1);

        // Still publishes afterwards, with a newer generation.
        let ev = p.on_viewport_changed(Point::new(0.0005, 0.0005)).unwrap().unwrap();
        assert_eq!(ev.generation, 3);
    }

    #[test]
    fn subscribers_see_generations_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut p = pipeline();
        p.subscribe(Box::new(Recorder { label: "s", log: log.clone() }));

        for lon in [0.0005, 0.0105, 0.0005] {
            p.on_viewport_changed(Point::new(lon, 0.0005)).unwrap();
        }
        assert_eq!(*log.lock(), vec![("s", 1), ("s", 2), ("s", 3)]);
        assert_eq!(p.metrics().counter(metrics::PUBLISHED), 3);
        assert_eq!(p.bus().last_generation(), Some(3));
    }

    #[test]
    fn out_of_mesh_event_has_no_profiles() {
        let mut p = pipeline();
        let ev = p.on_viewport_changed(Point::new(0.5, 0.5)).unwrap().unwrap();
        assert_eq!(ev.report.outcome, MeshOutcome::OutOfMesh);
        assert!(ev.profiles.is_none());
        assert!(ev.area.is_none());
    }

    #[test]
    fn profiles_cover_mesh_trees() {
        let mut p = pipeline();
        let ev = p.on_viewport_changed(Point::new(0.0005, 0.0005)).unwrap().unwrap();
        let profiles = ev.profiles.as_ref().unwrap();
        let xs: Vec<f64> = profiles.east_west.points.iter().map(|pt| pt.x).collect();
        assert_eq!(xs.len(), 2);
        assert!((xs[0] - 0.2).abs() < 1e-9);
        assert!((xs[1] - 0.8).abs() < 1e-9);
    }
}
