//! Fixed-cadence trajectory node
//!
//! Reads the latest waypoint snapshot on every tick, runs the pipeline on
//! tokio's blocking pool and hands the resulting markers to a publisher.

use crate::common::types::Waypoint;
use crate::config::PipelineConfig;
use crate::error::TrajectoryError;
use crate::lifecycle::{LifecycleError, LifecycleNode, LifecycleNodeBase, State};
use crate::pipeline::TrajectoryPipeline;
use crate::visualization::markers::{MarkerBatch, MarkerMessage};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Latest-value-wins waypoint list shared between the writer and the node.
///
/// Replacing the list is atomic; readers always see a whole list.
#[derive(Debug, Clone)]
pub struct WaypointSnapshot {
    sender: Arc<watch::Sender<Arc<Vec<Waypoint>>>>,
}

impl Default for WaypointSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl WaypointSnapshot {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(Vec::new()));
        WaypointSnapshot {
            sender: Arc::new(sender),
        }
    }

    /// Replace the whole waypoint list
    pub fn replace(&self, waypoints: Vec<Waypoint>) {
        self.sender.send_replace(Arc::new(waypoints));
    }

    pub fn current(&self) -> Arc<Vec<Waypoint>> {
        self.sender.borrow().clone()
    }
}

/// Output side of the node
pub trait MarkerPublisher: Send + Sync {
    fn publish(&self, batch: &MarkerBatch) -> anyhow::Result<()>;
}

/// Writes each batch as one JSON line holding a `MarkerMessage`
pub struct JsonLinesPublisher<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesPublisher {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> MarkerPublisher for JsonLinesPublisher<W> {
    fn publish(&self, batch: &MarkerBatch) -> anyhow::Result<()> {
        let line = serde_json::to_string(&MarkerMessage::from(batch))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("marker writer poisoned"))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Forwards batches to an in-process consumer
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<MarkerBatch>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MarkerBatch>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelPublisher { sender }, receiver)
    }
}

impl MarkerPublisher for ChannelPublisher {
    fn publish(&self, batch: &MarkerBatch) -> anyhow::Result<()> {
        self.sender
            .send(batch.clone())
            .map_err(|_| anyhow::anyhow!("marker receiver dropped"))
    }
}

/// What happened on one tick
#[derive(Debug)]
pub enum CycleOutcome {
    /// Markers were handed to the publisher
    Published { markers: usize },
    /// Fewer than two waypoints
    Skipped,
    Failed(TrajectoryError),
    TimedOut,
    /// A previous run, possibly timed out, has not finished yet
    Busy,
    /// The blocking task panicked or the publisher refused the batch
    Aborted(String),
}

/// One pipeline run against the current snapshot.
///
/// At most one run is in flight per runner and its clones: a run that
/// missed its deadline keeps the slot until the blocking task returns.
#[derive(Clone)]
pub struct CycleRunner {
    pipeline: Arc<TrajectoryPipeline>,
    waypoints: WaypointSnapshot,
    publisher: Arc<dyn MarkerPublisher>,
    timeout: Option<Duration>,
    in_flight: Arc<Semaphore>,
}

impl CycleRunner {
    pub fn new(
        pipeline: TrajectoryPipeline,
        waypoints: WaypointSnapshot,
        publisher: Arc<dyn MarkerPublisher>,
    ) -> Self {
        let timeout = match pipeline.config().node.solve_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        CycleRunner {
            pipeline: Arc::new(pipeline),
            waypoints,
            publisher,
            timeout,
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("Previous trajectory run still in flight, skipping tick");
                return CycleOutcome::Busy;
            }
        };
        let pipeline = self.pipeline.clone();
        let waypoints = self.waypoints.current();
        let task = tokio::task::spawn_blocking(move || {
            let result = pipeline.run(&waypoints);
            drop(permit);
            result
        });

        let joined = match self.timeout {
            Some(deadline) => match tokio::time::timeout(deadline, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("Trajectory generation exceeded {:?}, dropping cycle", deadline);
                    return CycleOutcome::TimedOut;
                }
            },
            None => task.await,
        };

        let output = match joined {
            Ok(Ok(Some(output))) => output,
            Ok(Ok(None)) => return CycleOutcome::Skipped,
            Ok(Err(e)) => {
                tracing::warn!("Trajectory generation failed: {}", e);
                return CycleOutcome::Failed(e);
            }
            Err(e) => {
                tracing::warn!("Trajectory task aborted: {}", e);
                return CycleOutcome::Aborted(e.to_string());
            }
        };

        let markers = output.markers.markers.len();
        if let Err(e) = self.publisher.publish(&output.markers) {
            tracing::warn!("Failed to publish markers: {:#}", e);
            return CycleOutcome::Aborted(e.to_string());
        }
        CycleOutcome::Published { markers }
    }
}

/// Lifecycle node driving `CycleRunner` at the configured rate
pub struct TrajectoryNode {
    base: LifecycleNodeBase,
    config: PipelineConfig,
    waypoints: WaypointSnapshot,
    publisher: Arc<dyn MarkerPublisher>,
    runner: Option<CycleRunner>,
    task: Option<JoinHandle<()>>,
}

impl TrajectoryNode {
    /// Create a new trajectory node
    pub fn new(
        name: &str,
        config: PipelineConfig,
        waypoints: WaypointSnapshot,
        publisher: Arc<dyn MarkerPublisher>,
    ) -> Self {
        TrajectoryNode {
            base: LifecycleNodeBase::new(name),
            config,
            waypoints,
            publisher,
            runner: None,
            task: None,
        }
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    /// Handle for replacing the waypoint list
    pub fn waypoints(&self) -> WaypointSnapshot {
        self.waypoints.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

async fn spin(runner: CycleRunner, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        // Failures are logged inside run_cycle
        if let CycleOutcome::Published { markers } = runner.run_cycle().await {
            tracing::debug!("Published {} markers", markers);
        }
    }
}

impl LifecycleNode for TrajectoryNode {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<(), LifecycleError> {
        self.base.require(State::Unconfigured, "configure")?;
        self.config.validate()?;
        self.runner = Some(CycleRunner::new(
            TrajectoryPipeline::new(self.config.clone()),
            self.waypoints.clone(),
            self.publisher.clone(),
        ));
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<(), LifecycleError> {
        self.base.require(State::Inactive, "activate")?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| LifecycleError::NoRuntime(self.base.name.clone()))?;
        let runner = match &self.runner {
            Some(runner) => runner.clone(),
            None => {
                return Err(LifecycleError::InvalidTransition {
                    node: self.base.name.clone(),
                    transition: "activate",
                    state: self.base.get_state(),
                })
            }
        };
        let period = Duration::from_secs_f64(1.0 / self.config.node.rate_hz);
        self.task = Some(runtime.spawn(spin(runner, period)));
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), LifecycleError> {
        self.base.require(State::Active, "deactivate")?;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<(), LifecycleError> {
        self.base.require(State::Inactive, "clean up")?;
        self.runner = None;
        self.base.set_state(State::Unconfigured);
        Ok(())
    }
}

impl Drop for TrajectoryNode {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
