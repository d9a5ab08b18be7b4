//! Results tabs: one per analysis family, each owning at most one job task.
//!
//! Every piece of work a tab starts gets a fresh generation number and a
//! child cancellation token. Starting new work, or leaving the tab, cancels
//! the previous token and bumps the generation, and finished work whose
//! generation is no longer current is discarded. The last request started
//! is therefore the one that is shown, whatever order responses arrive in.
//!
//! Scalar metric queries hold no job, so they run in a lane of their own
//! and never cancel a computation that is starting on the same tab.

use std::time::Duration;

use ci_client::{BackendClient, CancellationToken, JobError};
use ci_protocol::{
    AnalysisFamily, AnalysisVariant, GraphDescriptor, JobHandle, ProtocolError, ResourceMetric,
    ResourceView, ResultPayload, SkeletonRelation, DEFAULT_ZETA,
};
use ci_view::{ForceLayout, GraphVariant, LayoutConfig, TableView, Viewport, VisualGraph, ZoomPolicy};
use tokio::sync::mpsc;

use crate::config::AppConfig;

/// How result graphs are laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSettings {
    pub directed: bool,
    pub budget: Duration,
    pub seed: Option<u64>,
}

impl GraphSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            directed: config.graph.directed,
            budget: Duration::from_millis(config.graph.simulation_budget_ms),
            seed: None,
        }
    }

    fn variant_for(&self, variant: AnalysisVariant) -> GraphVariant {
        if self.directed && is_directed_relation(variant) {
            GraphVariant::Directed
        } else {
            GraphVariant::Plain
        }
    }

    fn layout(&self, variant: GraphVariant) -> LayoutConfig {
        let config = LayoutConfig::for_variant(variant).with_budget(self.budget);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Relations whose edges have a meaningful direction.
pub fn is_directed_relation(variant: AnalysisVariant) -> bool {
    matches!(
        variant,
        AnalysisVariant::LogSkeleton(
            SkeletonRelation::AlwaysBefore
                | SkeletonRelation::AlwaysAfter
                | SkeletonRelation::DirectlyFollowsAndCount
        ) | AnalysisVariant::Resource(ResourceView::HandoverOfWork | ResourceView::Subcontracting)
    )
}

/// A laid-out graph plus its zoom state.
#[derive(Debug, Clone)]
pub struct GraphView {
    pub graph: VisualGraph,
    pub layout: ForceLayout,
    pub viewport: Viewport,
}

impl GraphView {
    pub fn build(descriptor: &GraphDescriptor, variant: GraphVariant, config: LayoutConfig) -> Self {
        let graph = VisualGraph::from_descriptor(descriptor, variant);
        let mut layout = ForceLayout::new(&graph, config);
        layout.run();
        Self {
            graph,
            layout,
            viewport: Viewport::new(ZoomPolicy::Restricted),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultView {
    pub variant: AnalysisVariant,
    pub graphs: Vec<GraphView>,
    pub tables: Vec<TableView>,
    /// Graph currently shown when the result has several.
    pub focus: usize,
}

impl ResultView {
    pub fn build(variant: AnalysisVariant, payload: &ResultPayload, settings: &GraphSettings) -> Self {
        let graph_variant = settings.variant_for(variant);
        Self {
            variant,
            graphs: payload
                .graphs
                .iter()
                .map(|g| GraphView::build(g, graph_variant, settings.layout(graph_variant)))
                .collect(),
            tables: payload.tables.iter().map(TableView::from_descriptor).collect(),
            focus: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty() && self.tables.is_empty()
    }

    pub fn focused_graph_mut(&mut self) -> Option<&mut GraphView> {
        self.graphs.get_mut(self.focus)
    }
}

#[derive(Debug, Clone)]
pub enum TabContent {
    Empty,
    Result(Box<ResultView>),
    Metric { metric: ResourceMetric, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TabStatus {
    Idle,
    Starting,
    Ready,
    Loading(AnalysisVariant),
    Failed(String),
}

impl TabStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, TabStatus::Starting | TabStatus::Loading(_))
    }
}

#[derive(Debug)]
pub enum JobEvent {
    Started(JobHandle),
    Loaded(Box<ResultView>),
    Metric(ResourceMetric, f64),
    MetricFailed(ResourceMetric, String),
    Failed(String),
}

impl JobEvent {
    fn is_metric(&self) -> bool {
        matches!(self, JobEvent::Metric(..) | JobEvent::MetricFailed(..))
    }
}

/// Outcome of a tab's background work, tagged for staleness checks.
#[derive(Debug)]
pub struct JobMessage {
    pub family: AnalysisFamily,
    pub generation: u64,
    pub event: JobEvent,
}

/// A line for the console output, produced when a message is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug)]
pub struct TabState {
    family: AnalysisFamily,
    job: Option<JobHandle>,
    selected: Option<AnalysisVariant>,
    content: TabContent,
    status: TabStatus,
    generation: u64,
    token: CancellationToken,
    metric_generation: u64,
    metric_token: CancellationToken,
}

impl TabState {
    fn new(family: AnalysisFamily, root: &CancellationToken) -> Self {
        Self {
            family,
            job: None,
            selected: None,
            content: TabContent::Empty,
            status: TabStatus::Idle,
            generation: 0,
            token: root.child_token(),
            metric_generation: 0,
            metric_token: root.child_token(),
        }
    }

    pub fn family(&self) -> AnalysisFamily {
        self.family
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    pub fn selected(&self) -> Option<AnalysisVariant> {
        self.selected
    }

    pub fn content(&self) -> &TabContent {
        &self.content
    }

    pub fn status(&self) -> &TabStatus {
        &self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn metric_generation(&self) -> u64 {
        self.metric_generation
    }

    fn cancel_metric(&mut self, root: &CancellationToken) {
        self.metric_token.cancel();
        self.metric_generation += 1;
        self.metric_token = root.child_token();
    }

    /// Cancel in-flight work and invalidate anything it might still send.
    fn invalidate(&mut self, root: &CancellationToken) {
        self.token.cancel();
        self.generation += 1;
        self.token = root.child_token();
        if self.status.is_busy() {
            self.status = if self.job.is_some() {
                TabStatus::Ready
            } else {
                TabStatus::Idle
            };
        }
    }

    /// Forget the job and everything shown for it.
    fn clear(&mut self, root: &CancellationToken) {
        self.invalidate(root);
        self.cancel_metric(root);
        self.job = None;
        self.selected = None;
        self.content = TabContent::Empty;
        self.status = TabStatus::Idle;
    }
}

pub struct ResultsController {
    client: BackendClient,
    settings: GraphSettings,
    tabs: Vec<TabState>,
    active: usize,
    zeta: f64,
    root: CancellationToken,
    tx: mpsc::UnboundedSender<JobMessage>,
    rx: mpsc::UnboundedReceiver<JobMessage>,
}

impl ResultsController {
    pub fn new(client: BackendClient, settings: GraphSettings, root: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tabs = AnalysisFamily::ALL
            .iter()
            .map(|f| TabState::new(*f, &root))
            .collect();
        Self {
            client,
            settings,
            tabs,
            active: 0,
            zeta: DEFAULT_ZETA,
            root,
            tx,
            rx,
        }
    }

    fn index(family: AnalysisFamily) -> usize {
        AnalysisFamily::ALL
            .iter()
            .position(|f| *f == family)
            .unwrap_or(0)
    }

    pub fn active_family(&self) -> AnalysisFamily {
        self.tabs[self.active].family
    }

    pub fn tab(&self, family: AnalysisFamily) -> &TabState {
        &self.tabs[Self::index(family)]
    }

    pub fn active_tab(&self) -> &TabState {
        &self.tabs[self.active]
    }

    pub fn zeta(&self) -> f64 {
        self.zeta
    }

    pub fn set_zeta(&mut self, zeta: f64) -> Result<(), ProtocolError> {
        if !(zeta > 0.0 && zeta.is_finite()) {
            return Err(ProtocolError::InvalidZeta(zeta));
        }
        self.zeta = zeta;
        Ok(())
    }

    /// The focused graph of the active tab, for zooming and dragging.
    pub fn active_graph_mut(&mut self) -> Option<&mut GraphView> {
        match &mut self.tabs[self.active].content {
            TabContent::Result(view) => view.focused_graph_mut(),
            _ => None,
        }
    }

    pub fn active_result_mut(&mut self) -> Option<&mut ResultView> {
        match &mut self.tabs[self.active].content {
            TabContent::Result(view) => Some(view.as_mut()),
            _ => None,
        }
    }

    /// Leave the current tab, cancelling whatever it was waiting for.
    pub fn switch_to(&mut self, family: AnalysisFamily) {
        let target = Self::index(family);
        if target == self.active {
            return;
        }
        let leaving = &mut self.tabs[self.active];
        if leaving.status.is_busy() {
            tracing::debug!(family = %leaving.family, "Cancelling work of the tab being left");
        }
        leaving.invalidate(&self.root);
        leaving.cancel_metric(&self.root);
        self.active = target;
    }

    /// Drop every tab's job and result. Called when a new log is uploaded
    /// or committed, since old job ids belong to the previous log.
    pub fn reset(&mut self) {
        for tab in &mut self.tabs {
            tab.clear(&self.root);
        }
        tracing::debug!("Results cleared for a new log");
    }

    fn begin(&mut self, idx: usize) -> (u64, CancellationToken) {
        let tab = &mut self.tabs[idx];
        tab.invalidate(&self.root);
        (tab.generation, tab.token.clone())
    }

    /// Start the active tab's server-side computation.
    pub fn compute(&mut self) -> Result<(), JobError> {
        let family = self.active_family();
        if family.start_path().is_none() {
            return Err(JobError::Synchronous(family));
        }
        let idx = self.active;
        let (generation, token) = self.begin(idx);
        self.tabs[idx].status = TabStatus::Starting;

        let client = self.client.clone();
        let tx = self.tx.clone();
        let zeta = self.zeta;
        tokio::spawn(async move {
            let event = match client.start_job(family, Some(zeta), &token).await {
                Ok(handle) => JobEvent::Started(handle),
                Err(JobError::Cancelled) => return,
                Err(e) => JobEvent::Failed(e.to_string()),
            };
            let _ = tx.send(JobMessage {
                family,
                generation,
                event,
            });
        });
        Ok(())
    }

    /// Show a variant. Switches to its tab; job-backed variants need the
    /// tab's computation to have been started first.
    pub fn select_variant(&mut self, variant: AnalysisVariant) -> Result<(), JobError> {
        let family = variant.family();
        self.switch_to(family);
        let idx = self.active;
        let job = self.tabs[idx].job.clone();
        if variant.requires_job() && job.is_none() {
            return Err(JobError::NoJob(family));
        }
        let (generation, token) = self.begin(idx);
        self.tabs[idx].status = TabStatus::Loading(variant);
        self.tabs[idx].selected = Some(variant);

        let client = self.client.clone();
        let tx = self.tx.clone();
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let event = match client.fetch_result(variant, job.as_ref(), &token).await {
                Ok(payload) => {
                    let built = tokio::task::spawn_blocking(move || {
                        ResultView::build(variant, &payload, &settings)
                    })
                    .await;
                    match built {
                        Ok(view) => JobEvent::Loaded(Box::new(view)),
                        Err(e) => JobEvent::Failed(format!("layout failed: {e}")),
                    }
                }
                Err(JobError::Cancelled) => return,
                Err(e) => JobEvent::Failed(e.to_string()),
            };
            if token.is_cancelled() {
                return;
            }
            let _ = tx.send(JobMessage {
                family,
                generation,
                event,
            });
        });
        Ok(())
    }

    /// Query a scalar resource-profile metric on the resource tab.
    ///
    /// Only an earlier metric query is superseded; the tab's job and any
    /// computation being started are left alone.
    pub fn request_metric(&mut self, metric: ResourceMetric, params: Vec<(String, String)>) {
        let family = AnalysisFamily::ResourceBased;
        self.switch_to(family);
        let tab = &mut self.tabs[self.active];
        tab.cancel_metric(&self.root);
        let (generation, token) = (tab.metric_generation, tab.metric_token.clone());

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                r = client.scalar_metric(metric, &params) => r,
            };
            let event = match result {
                Ok(value) => JobEvent::Metric(metric, value),
                Err(e) => JobEvent::MetricFailed(metric, e.to_string()),
            };
            let _ = tx.send(JobMessage {
                family,
                generation,
                event,
            });
        });
    }

    /// Apply a finished job to its tab. Returns `None` for stale messages.
    pub fn apply(&mut self, message: JobMessage) -> Option<Notice> {
        let tab = &mut self.tabs[Self::index(message.family)];
        let current = if message.event.is_metric() {
            tab.metric_generation
        } else {
            tab.generation
        };
        if message.generation != current {
            tracing::debug!(
                family = %message.family,
                generation = message.generation,
                current,
                "Dropping stale job result"
            );
            return None;
        }
        let notice = match message.event {
            JobEvent::Started(handle) => {
                let text = format!("{} computation started (job {})", tab.family.label(), handle.id());
                tab.job = Some(handle);
                tab.status = TabStatus::Ready;
                Notice { text, is_error: false }
            }
            JobEvent::Loaded(view) => {
                let text = if view.is_empty() {
                    format!("{}: no data", view.variant.label())
                } else {
                    format!(
                        "{}: {} graph(s), {} table(s)",
                        view.variant.label(),
                        view.graphs.len(),
                        view.tables.len()
                    )
                };
                tab.content = TabContent::Result(view);
                tab.status = TabStatus::Ready;
                Notice { text, is_error: false }
            }
            JobEvent::Metric(metric, value) => {
                tab.content = TabContent::Metric { metric, value };
                Notice {
                    text: format!("{metric}: {value}"),
                    is_error: false,
                }
            }
            JobEvent::MetricFailed(metric, reason) => Notice {
                text: format!("{metric} failed: {reason}"),
                is_error: true,
            },
            JobEvent::Failed(reason) => {
                tab.status = TabStatus::Failed(reason.clone());
                Notice {
                    text: format!("{} failed: {reason}", tab.family.label()),
                    is_error: true,
                }
            }
        };
        Some(notice)
    }

    /// Apply everything that has finished since the last call.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            notices.extend(self.apply(message));
        }
        notices
    }

    /// Wait for the next finished job without applying it.
    pub async fn next_message(&mut self) -> Option<JobMessage> {
        self.rx.recv().await
    }

    /// Cancel every tab's work.
    pub fn shutdown(&mut self) {
        self.root.cancel();
    }
}
