//! Observer port for watching a training run.
//!
//! Observers only receive copies of what happened; nothing they do feeds
//! back into training.

use crate::{AGENT_COUNT, Action, Position, reward::Verdict, trainer::EpisodeCounters};

/// What happened to both agents in one training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    /// Global step index, starting at 1.
    pub tick: u64,
    pub alpha: f64,
    pub positions: [Position; AGENT_COUNT],
    pub actions: [Action; AGENT_COUNT],
    pub rewards: [f64; AGENT_COUNT],
    /// Value of each agent's (state, action) after the update.
    pub values: [f64; AGENT_COUNT],
    pub verdict: Verdict,
}

/// Observer trait for monitoring training.
///
/// The trainer calls `on_step` after both tables are updated and
/// `on_episode_end` whenever a restart is issued, with the counters already
/// incremented.
pub trait TrainingObserver {
    fn on_step(&mut self, _record: &StepRecord) {}

    fn on_episode_end(&mut self, _verdict: Verdict, _counters: &EpisodeCounters) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {}

/// One point of the value/reward time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSample {
    pub tick: u64,
    pub value: f64,
    pub reward: f64,
}

/// Records the updated value and reward of every step, per agent.
#[derive(Debug, Default, Clone)]
pub struct StepSeries {
    samples: [Vec<StepSample>; AGENT_COUNT],
    restarts: u64,
}

impl StepSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples of one agent in step order.
    pub fn samples(&self, agent: usize) -> &[StepSample] {
        &self.samples[agent]
    }

    /// Number of restarts seen.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

impl TrainingObserver for StepSeries {
    fn on_step(&mut self, record: &StepRecord) {
        for (agent, samples) in self.samples.iter_mut().enumerate() {
            samples.push(StepSample {
                tick: record.tick,
                value: record.values[agent],
                reward: record.rewards[agent],
            });
        }
    }

    fn on_episode_end(&mut self, _verdict: Verdict, _counters: &EpisodeCounters) {
        self.restarts += 1;
    }
}

/// Logs the success and failure counts every `every` episodes.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    every: u64,
    episodes: u64,
}

impl ProgressLog {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            episodes: 0,
        }
    }
}

impl TrainingObserver for ProgressLog {
    fn on_episode_end(&mut self, _verdict: Verdict, counters: &EpisodeCounters) {
        self.episodes += 1;
        if self.episodes % self.every == 0 {
            log::info!(
                "Success: {}, Failures: {}",
                counters.successes,
                counters.failures
            );
        }
    }
}

/// Forwards every event to each observer in turn.
pub struct Fanout<'a> {
    observers: Vec<&'a mut dyn TrainingObserver>,
}

impl<'a> Fanout<'a> {
    pub fn new(observers: Vec<&'a mut dyn TrainingObserver>) -> Self {
        Self { observers }
    }
}

impl TrainingObserver for Fanout<'_> {
    fn on_step(&mut self, record: &StepRecord) {
        for observer in &mut self.observers {
            observer.on_step(record);
        }
    }

    fn on_episode_end(&mut self, verdict: Verdict, counters: &EpisodeCounters) {
        for observer in &mut self.observers {
            observer.on_episode_end(verdict, counters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tick: u64, verdict: Verdict) -> StepRecord {
        StepRecord {
            tick,
            alpha: 1.0,
            positions: [Position::new(0, 0), Position::new(1, 0)],
            actions: [Action::Right, Action::Stay],
            rewards: [-0.1, -0.2],
            values: [-0.05, -0.1],
            verdict,
        }
    }

    #[test]
    fn series_keeps_one_sample_per_agent_and_step() {
        let mut series = StepSeries::new();
        series.on_step(&record(1, Verdict::Continue));
        series.on_step(&record(2, Verdict::Win));
        series.on_episode_end(Verdict::Win, &EpisodeCounters::default());

        assert_eq!(series.samples(0).len(), 2);
        assert_eq!(series.samples(1)[1].tick, 2);
        assert_eq!(series.samples(1)[0].reward, -0.2);
        assert_eq!(series.samples(0)[0].value, -0.05);
        assert_eq!(series.restarts(), 1);
    }

    #[test]
    fn fanout_reaches_every_observer() {
        let mut first = StepSeries::new();
        let mut second = StepSeries::new();
        {
            let observers: Vec<&mut dyn TrainingObserver> = vec![&mut first, &mut second];
            let mut fanout = Fanout::new(observers);
            fanout.on_step(&record(1, Verdict::Continue));
            fanout.on_episode_end(Verdict::Fail, &EpisodeCounters::default());
        }
        assert_eq!(first.samples(0).len(), 1);
        assert_eq!(second.samples(0).len(), 1);
        assert_eq!(second.restarts(), 1);
    }
}
