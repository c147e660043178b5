//! Per-stage instrumentation.

use std::{fmt, time::Duration};

use super::Stage;
use crate::cache::CacheOutcome;

/// Elapsed time of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTiming {
    /// Wall time spent in the stage, as measured by the pipeline's
    /// [`crate::Environment`]
    pub elapsed: Duration,
    /// Cache outcome for the key stages; `None` for cipher stages
    pub cache: Option<CacheOutcome>,
}

/// Timings for every stage of one re-encryption.
///
/// `Display` renders one comma-separated line of milliseconds in stage order
/// (`sender_key,decrypt,receiver_key,encrypt`), suitable for appending to a
/// CSV benchmark log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    stages: [StageTiming; Stage::COUNT],
}

impl StageTimings {
    /// Timing of `stage`. Zero if the stage did not run.
    pub fn get(&self, stage: Stage) -> StageTiming {
        self.stages[stage.index()]
    }

    /// Sum of all stage times.
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|timing| timing.elapsed).sum()
    }

    /// Number of key stages served from the cache.
    pub fn cache_hits(&self) -> usize {
        self.stages.iter().filter(|timing| timing.cache == Some(CacheOutcome::Hit)).count()
    }

    pub(crate) fn record(&mut self, stage: Stage, timing: StageTiming) {
        self.stages[stage.index()] = timing;
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, timing) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{:.3}", timing.elapsed.as_secs_f64() * 1000.0)?;
        }
        Ok(())
    }
}

/// Receives each stage's timing as soon as the stage completes.
///
/// Only successful stages are reported.
pub trait StageObserver: Send + Sync {
    /// Called once per completed stage.
    fn on_stage(&self, stage: Stage, timing: &StageTiming);
}
