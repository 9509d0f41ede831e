//! Per-step census, time-series records and the run summary.

use crate::config::{SimulationMode, SummaryStatistic};
use crate::run::EndReason;
use serde::{Deserialize, Serialize};

/// Population snapshot for one step
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Census {
    /// Prey count (agents in grid mode, continuous in aggregate mode)
    pub prey: f64,
    /// Predator count
    pub predators: f64,
    /// Total vegetation (grid) or resource pool (aggregate)
    pub resources: f64,
    /// Current drought level
    pub drought: f64,
}

impl Census {
    /// Format as a one-line console summary
    pub fn summary(&self, step: u64) -> String {
        format!(
            "T:{:6} | Prey:{:9.2} | Pred:{:9.2} | Res:{:8.2} | Drought:{:.2}",
            step, self.prey, self.predators, self.resources, self.drought
        )
    }
}

/// One line of the time series
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepRecord {
    /// Elapsed run time in seconds at this step
    pub elapsed_secs: f64,
    /// Step number in grid mode, simulated time in aggregate mode
    pub clock: f64,
    pub census: Census,
    /// Resident memory in MB, when recorded
    pub memory_mb: Option<f64>,
}

impl StepRecord {
    /// CSV header matching [`StepRecord::to_csv_line`]
    pub fn csv_header(mode: SimulationMode, with_memory: bool) -> String {
        let clock = match mode {
            SimulationMode::Grid => "sim_step",
            SimulationMode::Aggregate => "sim_time",
        };
        let mut header = format!("timestamp,{},prey,predator,resources,drought", clock);
        if with_memory {
            header.push_str(",memory_mb");
        }
        header
    }

    /// Comma-separated fields, numbers to 2 decimal places
    pub fn to_csv_line(&self) -> String {
        let mut line = format!(
            "{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}",
            self.elapsed_secs,
            self.clock,
            self.census.prey,
            self.census.predators,
            self.census.resources,
            self.census.drought
        );
        if let Some(mb) = self.memory_mb {
            line.push_str(&format!(",{:.2}", mb));
        }
        line
    }
}

/// Terminal record written once per run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub mode: SimulationMode,
    pub statistic: SummaryStatistic,
    pub steps: u64,
    pub duration_secs: f64,
    pub prey: f64,
    pub predators: f64,
    pub resources: f64,
    pub drought: f64,
    pub seed: u64,
    pub memory_bytes: Option<u64>,
    pub end_reason: EndReason,
}

impl RunSummary {
    pub fn index_header() -> &'static str {
        "run_id,duration_s,prey,predator,resources,drought,seed,memory_bytes"
    }

    /// Row for the cross-run index file
    pub fn to_index_line(&self) -> String {
        format!(
            "{},{:.2},{:.2},{:.2},{:.2},{:.2},{},{}",
            self.run_id,
            self.duration_secs,
            self.prey,
            self.predators,
            self.resources,
            self.drought,
            self.seed,
            self.memory_bytes.map_or(String::new(), |b| b.to_string())
        )
    }
}

/// Running totals for the summary record
#[derive(Clone, Debug, Default)]
pub struct SummaryAccumulator {
    count: u64,
    sum: Census,
    last: Census,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, census: &Census) {
        self.count += 1;
        self.sum.prey += census.prey;
        self.sum.predators += census.predators;
        self.sum.resources += census.resources;
        self.sum.drought += census.drought;
        self.last = *census;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last(&self) -> Census {
        self.last
    }

    /// Mean over every recorded census
    pub fn average(&self) -> Census {
        if self.count == 0 {
            return Census::default();
        }
        let n = self.count as f64;
        Census {
            prey: self.sum.prey / n,
            predators: self.sum.predators / n,
            resources: self.sum.resources / n,
            drought: self.sum.drought / n,
        }
    }

    pub fn summarize(&self, statistic: SummaryStatistic) -> Census {
        match statistic {
            SummaryStatistic::Final => self.last(),
            SummaryStatistic::Average => self.average(),
        }
    }
}
