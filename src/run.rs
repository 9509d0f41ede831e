//! Run lifecycle: `Idle -> Running -> Ended`.
//!
//! Ticks of elapsed time are turned into whole simulation steps through an
//! accumulator, so the step cadence is fixed no matter how coarse the ticks
//! are. Every step appends one record to the sink; ending the run writes the
//! summary exactly once.

use crate::config::{Config, ConfigError};
use crate::memory_monitor::MemorySampler;
use crate::record::{RecordSink, SinkError};
use crate::stats::{RunSummary, StepRecord, SummaryAccumulator};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Absorbs float error when ticks are exact multiples of `dt`
const STEP_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Ended,
}

/// Why a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    MaxSteps,
    Extinct,
    WallBudget,
    Stopped,
    SinkFailure,
}

pub struct RunManager<S: RecordSink> {
    config: Config,
    sink: S,
    state: RunState,
    world: Option<World>,
    accumulator: f64,
    elapsed_secs: f64,
    steps: u64,
    totals: SummaryAccumulator,
    memory: MemorySampler,
    stop: Arc<AtomicBool>,
    end_reason: Option<EndReason>,
    summary: Option<RunSummary>,
}

impl<S: RecordSink> RunManager<S> {
    pub fn new(config: Config, sink: S) -> Self {
        Self {
            config,
            sink,
            state: RunState::Idle,
            world: None,
            accumulator: 0.0,
            elapsed_secs: 0.0,
            steps: 0,
            totals: SummaryAccumulator::new(),
            memory: MemorySampler::new(),
            stop: Arc::new(AtomicBool::new(false)),
            end_reason: None,
            summary: None,
        }
    }

    /// Validate, open the sink and seed the world.
    ///
    /// A failure leaves the manager `Idle` so the caller can fix the input
    /// and try again.
    pub fn start(&mut self) -> Result<(), RunError> {
        if self.state != RunState::Idle {
            return Err(RunError::AlreadyStarted);
        }
        self.config.validate()?;

        let run = &self.config.run;
        let header = StepRecord::csv_header(run.mode, run.record_memory);
        self.sink.open(&run.run_id, &header)?;

        self.world = Some(World::new_with_seed(self.config.clone(), run.seed));
        self.state = RunState::Running;
        log::info!(
            "Run '{}' started ({} mode, seed {}, dt {})",
            run.run_id,
            run.mode.name(),
            run.seed,
            self.config.dt()
        );
        Ok(())
    }

    /// Feed `dt_secs` of elapsed time, firing every whole step it covers.
    ///
    /// Returns the number of steps fired. The termination condition is
    /// checked before each step; when it holds the run is ended instead.
    pub fn tick(&mut self, dt_secs: f64) -> Result<usize, RunError> {
        if self.state != RunState::Running {
            return Err(RunError::NotRunning);
        }
        self.elapsed_secs += dt_secs.max(0.0);
        self.accumulator += dt_secs.max(0.0) * self.config.run.step_rate;

        if let Some(reason) = self.termination() {
            self.end_with(reason)?;
            return Ok(0);
        }

        let mut fired = 0;
        while self.accumulator + STEP_EPSILON >= 1.0 {
            if let Some(reason) = self.termination() {
                self.end_with(reason)?;
                break;
            }
            self.accumulator -= 1.0;
            self.step()?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Advance the world by one step and record it
    pub fn step(&mut self) -> Result<(), RunError> {
        if self.state != RunState::Running {
            return Err(RunError::NotRunning);
        }
        let world = self.world.as_mut().ok_or(RunError::NotRunning)?;
        world.step();
        self.steps += 1;

        let census = world.census();
        let clock = world.sim_clock();
        self.totals.record(&census);

        let memory_mb = if self.config.run.record_memory {
            self.memory.sample();
            self.memory.last_mb()
        } else {
            None
        };

        let interval = self.config.logging.stats_interval;
        if interval > 0 && self.steps % interval == 0 {
            log::debug!("{}", census.summary(self.steps));
        }

        let record = StepRecord {
            elapsed_secs: self.elapsed_secs,
            clock,
            census,
            memory_mb,
        };
        if let Err(e) = self.sink.append(&record) {
            return Err(self.abort(e));
        }
        Ok(())
    }

    /// Ask the run to stop before its next step
    pub fn request_stop(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            log::warn!("Stop requested for run '{}'", self.config.run.run_id);
        }
    }

    /// Shared flag that stops the run when set from elsewhere
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// End the run. Calling it again, or before `start`, does nothing.
    pub fn end(&mut self) -> Result<(), RunError> {
        self.end_with(EndReason::Stopped)
    }

    /// Start if needed, then feed fixed `dt` ticks until the run ends
    pub fn run_headless(&mut self) -> Result<RunSummary, RunError> {
        if self.state == RunState::Idle {
            self.start()?;
        }
        let dt = self.config.dt();
        while self.state == RunState::Running {
            self.tick(dt)?;
        }
        self.summary.clone().ok_or(RunError::NotRunning)
    }

    fn termination(&self) -> Option<EndReason> {
        let run = &self.config.run;
        if self.stop.load(Ordering::SeqCst) {
            return Some(EndReason::Stopped);
        }
        if self.steps >= run.max_steps {
            return Some(EndReason::MaxSteps);
        }
        if self
            .world
            .as_ref()
            .map_or(false, |w| w.is_extinct(run.extinction_threshold))
        {
            return Some(EndReason::Extinct);
        }
        match run.max_duration_secs {
            Some(limit) if self.elapsed_secs >= limit => {
                log::warn!("Run '{}' hit its {}s budget", run.run_id, limit);
                Some(EndReason::WallBudget)
            }
            _ => None,
        }
    }

    fn end_with(&mut self, reason: EndReason) -> Result<(), RunError> {
        if self.state != RunState::Running {
            return Ok(());
        }
        self.state = RunState::Ended;
        self.end_reason = Some(reason);

        let run = &self.config.run;
        let values = self.totals.summarize(run.summary);
        let summary = RunSummary {
            run_id: run.run_id.clone(),
            mode: run.mode,
            statistic: run.summary,
            steps: self.steps,
            duration_secs: self.elapsed_secs,
            prey: values.prey,
            predators: values.predators,
            resources: values.resources,
            drought: values.drought,
            seed: run.seed,
            memory_bytes: if run.record_memory {
                self.memory.peak_bytes()
            } else {
                None
            },
            end_reason: reason,
        };

        log::info!(
            "Run '{}' ended after {} steps ({:?})",
            summary.run_id,
            summary.steps,
            reason
        );
        let result = self.sink.finish(&summary);
        self.summary = Some(summary);
        result.map_err(|e| {
            log::error!("Failed to write summary: {}", e);
            RunError::Sink(e)
        })
    }

    /// Sink failure mid-run: flush what we can and stop without a summary
    fn abort(&mut self, error: SinkError) -> RunError {
        log::error!(
            "Record sink failed at step {}: {}; aborting run '{}'",
            self.steps,
            error,
            self.config.run.run_id
        );
        if let Err(e) = self.sink.flush() {
            log::error!("Flush after failure also failed: {}", e);
        }
        self.state = RunState::Ended;
        self.end_reason = Some(EndReason::SinkFailure);
        RunError::Sink(error)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Summary written at the end of the run
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Errors surfaced by the run lifecycle
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Sink(SinkError),
    NotRunning,
    AlreadyStarted,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {}", e),
            Self::Sink(e) => write!(f, "Output error: {}", e),
            Self::NotRunning => write!(f, "run is not running"),
            Self::AlreadyStarted => write!(f, "run was already started"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SinkError> for RunError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}
