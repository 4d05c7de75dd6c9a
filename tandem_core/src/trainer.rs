//! Drives episodes for the agent pair and owns all mutable training state.

use std::fmt;

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    AGENT_COUNT, Action, Position,
    config::{RunConfig, TrainingConfig},
    error::{ConfigError, LookupError},
    learner::{LearningRate, QLearner},
    observer::{NoopObserver, StepRecord, TrainingObserver},
    partner_of,
    policy::EpsilonGreedy,
    q_table::{Pruned, QTable, TableLayout},
    reward::{DeathCause, RewardModel, Verdict},
    scenario::Scenario,
};

/// Episode outcome counts since training last (re)started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeCounters {
    pub successes: u64,
    pub failures: u64,
}

impl EpisodeCounters {
    /// Number of restarts issued.
    pub fn restarts(&self) -> u64 {
        self.successes + self.failures
    }

    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Win => self.successes += 1,
            Verdict::Fail => self.failures += 1,
            Verdict::Continue => {}
        }
    }
}

/// Why a training run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The success counter reached the configured epochs.
    Converged,
    /// The failure counter reached its cap.
    FailureCap,
    /// The run used up its step budget.
    StepCap,
}

/// Summary of one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingReport {
    pub counters: EpisodeCounters,
    /// Steps taken by this run.
    pub steps: u64,
    pub stop: StopReason,
}

/// One greedy move of both agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutStep {
    pub from: [Position; AGENT_COUNT],
    pub actions: [Action; AGENT_COUNT],
    pub to: [Position; AGENT_COUNT],
}

/// How a greedy rollout ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutOutcome {
    ReachedGoal,
    Failed {
        deaths: [Option<DeathCause>; AGENT_COUNT],
    },
    StepLimit,
}

/// A greedy walk from the start states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollout {
    pub steps: Vec<RolloutStep>,
    pub outcome: RolloutOutcome,
}

impl Rollout {
    pub fn reached_goal(&self) -> bool {
        self.outcome == RolloutOutcome::ReachedGoal
    }
}

/// Result of repeated train-then-rollout attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveReport {
    pub solved: bool,
    pub attempts: usize,
    /// Times both tables were rebuilt from scratch.
    pub resets: usize,
    /// The last training run.
    pub training: TrainingReport,
    /// The last rollout.
    pub rollout: Rollout,
}

/// Trains both agents of a scenario with independent, coupled value tables.
pub struct Trainer {
    scenario: Scenario,
    config: TrainingConfig,
    policy: EpsilonGreedy,
    learner: QLearner,
    schedule: LearningRate,
    rewards: RewardModel,
    tables: [QTable; AGENT_COUNT],
    counters: EpisodeCounters,
    tick: u64,
    positions: [Position; AGENT_COUNT],
    pending: [Action; AGENT_COUNT],
    rng: StdRng,
}

impl Trainer {
    /// Validates the configuration against the scenario and builds both
    /// tables.
    pub fn new(scenario: Scenario, config: TrainingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let [one, two] = scenario.starts();
        let distance = one.distance(&two);
        let threshold = config.rewards.proximity_threshold;
        if distance > threshold {
            return Err(ConfigError::StartsTooFarApart {
                distance,
                threshold,
            });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let tables = Self::build_tables(&scenario, &config);

        Ok(Trainer {
            policy: EpsilonGreedy::new(config.epsilon),
            learner: QLearner::new(config.gamma),
            schedule: LearningRate::new(config.alpha_decay),
            rewards: RewardModel::new(config.rewards.clone()),
            positions: scenario.starts(),
            pending: [Action::Stay; AGENT_COUNT],
            counters: EpisodeCounters::default(),
            tick: 1,
            tables,
            scenario,
            config,
            rng,
        })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        let scenario = Scenario::from_config(&config.scenario)?;
        Self::new(scenario, config.training.clone())
    }

    /// Builds a trainer from `config` and runs the solve loop on it.
    pub fn run(
        config: &RunConfig,
        observer: &mut dyn TrainingObserver,
    ) -> crate::Result<(Self, SolveReport)> {
        let mut trainer = Self::from_config(config)?;
        let report = trainer.solve_with(observer)?;
        Ok((trainer, report))
    }

    fn build_tables(scenario: &Scenario, config: &TrainingConfig) -> [QTable; AGENT_COUNT] {
        scenario.agents.map(|agent| {
            QTable::build(
                &scenario.room,
                TableLayout {
                    shift: agent.shift,
                    coverage: config.partner_coverage,
                    include_stay: config.include_stay,
                    initial_value: config.initial_value,
                },
            )
        })
    }

    /// Throws away everything learned so far.
    pub fn reset_tables(&mut self) {
        self.tables = Self::build_tables(&self.scenario, &self.config);
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Value table of agent `agent` (0 or 1).
    pub fn table(&self, agent: usize) -> &QTable {
        &self.tables[agent]
    }

    pub fn counters(&self) -> EpisodeCounters {
        self.counters
    }

    /// Global step counter; never reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Current positions of both agents.
    pub fn positions(&self) -> [Position; AGENT_COUNT] {
        self.positions
    }

    fn choose_actions(
        &mut self,
        positions: [Position; AGENT_COUNT],
        explore: bool,
    ) -> Result<[Action; AGENT_COUNT], LookupError> {
        let mut actions = [Action::Stay; AGENT_COUNT];
        for (agent, action) in actions.iter_mut().enumerate() {
            *action = self.policy.choose_action(
                &self.tables[agent],
                positions[agent],
                positions[partner_of(agent)],
                explore,
                &mut self.rng,
            )?;
        }
        Ok(actions)
    }

    fn apply(
        &self,
        positions: [Position; AGENT_COUNT],
        actions: [Action; AGENT_COUNT],
    ) -> Result<[Position; AGENT_COUNT], LookupError> {
        let mut next = positions;
        for agent in 0..AGENT_COUNT {
            let shift = self.scenario.agents[agent].shift;
            let position = positions[agent];
            let action = actions[agent];
            next[agent] = action
                .apply(position, shift)
                .filter(|target| self.scenario.room.contains(*target))
                .ok_or(LookupError::IllegalMove {
                    position,
                    action,
                    shift,
                })?;
        }
        Ok(next)
    }

    /// Best stored value reachable from the joint state `next` of `agent`.
    ///
    /// A terminal joint state may lie outside a neighborhood table; it then
    /// holds the initial value.
    fn best_next_value(
        &self,
        agent: usize,
        next: [Position; AGENT_COUNT],
        terminal: bool,
    ) -> Result<f64, LookupError> {
        let table = &self.tables[agent];
        let (own, partner) = (next[agent], next[partner_of(agent)]);
        if terminal && !table.contains(own, partner) {
            return Ok(table.initial_value());
        }
        table.max_value(own, partner)
    }

    /// Plays one step: score the pending moves, update both tables, then
    /// advance or restart and pick the next moves.
    pub fn step(&mut self, observer: &mut dyn TrainingObserver) -> Result<Verdict, LookupError> {
        let previous = self.positions;
        let actions = self.pending;
        let next = self.apply(previous, actions)?;

        let outcome = self.rewards.evaluate(&self.scenario.room, next, previous);
        let terminal = outcome.restart();

        // Both targets are read before either table changes.
        let best = [
            self.best_next_value(0, next, terminal)?,
            self.best_next_value(1, next, terminal)?,
        ];
        let alpha = self.schedule.alpha(self.tick);

        let mut values = [0.0; AGENT_COUNT];
        for agent in 0..AGENT_COUNT {
            let own = previous[agent];
            let partner = previous[partner_of(agent)];
            values[agent] = self.learner.update(
                &mut self.tables[agent],
                own,
                partner,
                actions[agent],
                alpha,
                outcome.rewards[agent],
                best[agent],
            )?;

            let certain_death = outcome.deaths[agent].is_some_and(DeathCause::is_certain);
            if self.config.prune_fatal_actions && certain_death {
                let pruned = self.tables[agent].prune(own, partner, actions[agent])?;
                if pruned == Pruned::Removed {
                    log::debug!(
                        "agent {agent}: pruned {} at {own} with partner at {partner}",
                        actions[agent]
                    );
                }
            }
        }

        let verdict = outcome.verdict();
        observer.on_step(&StepRecord {
            tick: self.tick,
            alpha,
            positions: previous,
            actions,
            rewards: outcome.rewards,
            values,
            verdict,
        });

        if terminal {
            self.counters.record(verdict);
            self.positions = self.scenario.starts();
            observer.on_episode_end(verdict, &self.counters);
        } else {
            self.positions = next;
        }

        self.pending = self.choose_actions(self.positions, true)?;
        self.tick += 1;
        Ok(verdict)
    }

    /// Trains until the success counter reaches the configured epochs.
    pub fn train(&mut self) -> Result<TrainingReport, LookupError> {
        self.train_with(&mut NoopObserver)
    }

    /// Like [`Trainer::train`], reporting every step to `observer`.
    ///
    /// Counters are reset and both agents put back on their starts; the
    /// tables and the global tick carry over from earlier runs.
    pub fn train_with(
        &mut self,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingReport, LookupError> {
        self.counters = EpisodeCounters::default();
        self.positions = self.scenario.starts();
        self.pending = self.choose_actions(self.positions, true)?;

        log::info!(
            "training until {} successes (tick {})",
            self.config.epochs,
            self.tick
        );
        let mut steps = 0;
        let stop = loop {
            if self.counters.successes >= self.config.epochs {
                break StopReason::Converged;
            }
            if self
                .config
                .max_failures
                .is_some_and(|cap| self.counters.failures >= cap)
            {
                log::warn!(
                    "stopping after {} failures with {} successes",
                    self.counters.failures,
                    self.counters.successes
                );
                break StopReason::FailureCap;
            }
            if self.config.max_steps.is_some_and(|cap| steps >= cap) {
                log::warn!("stopping after {steps} steps without converging");
                break StopReason::StepCap;
            }
            self.step(observer)?;
            steps += 1;
        };

        log::info!(
            "training stopped ({stop:?}) after {steps} steps: Success: {}, Failures: {}",
            self.counters.successes,
            self.counters.failures
        );
        Ok(TrainingReport {
            counters: self.counters,
            steps,
            stop,
        })
    }

    /// Walks both agents greedily from their starts for at most `limit`
    /// steps. Tables and counters are left untouched.
    pub fn rollout(&mut self, limit: usize) -> Result<Rollout, LookupError> {
        let mut positions = self.scenario.starts();
        let mut steps = Vec::new();

        for _ in 0..limit {
            let actions = self.choose_actions(positions, false)?;
            let next = self.apply(positions, actions)?;
            steps.push(RolloutStep {
                from: positions,
                actions,
                to: next,
            });

            let outcome = self.rewards.evaluate(&self.scenario.room, next, positions);
            match outcome.verdict() {
                Verdict::Win => {
                    return Ok(Rollout {
                        steps,
                        outcome: RolloutOutcome::ReachedGoal,
                    });
                }
                Verdict::Fail => {
                    return Ok(Rollout {
                        steps,
                        outcome: RolloutOutcome::Failed {
                            deaths: outcome.deaths,
                        },
                    });
                }
                Verdict::Continue => positions = next,
            }
        }

        Ok(Rollout {
            steps,
            outcome: RolloutOutcome::StepLimit,
        })
    }

    /// Trains and checks with a greedy rollout until the pair reaches the
    /// goal.
    pub fn solve(&mut self) -> Result<SolveReport, LookupError> {
        self.solve_with(&mut NoopObserver)
    }

    /// Like [`Trainer::solve`], reporting every training step to `observer`.
    ///
    /// Both tables are rebuilt after `attempts_before_reset` failed attempts
    /// in a row; gives up after `max_attempts`.
    pub fn solve_with(
        &mut self,
        observer: &mut dyn TrainingObserver,
    ) -> Result<SolveReport, LookupError> {
        let mut attempts = 0;
        let mut resets = 0;
        let mut since_reset = 0;

        loop {
            attempts += 1;
            let training = self.train_with(observer)?;
            let rollout = self.rollout(self.config.rollout_limit)?;
            let solved = rollout.reached_goal();
            log::info!(
                "attempt {attempts}: rollout {:?} after {} steps",
                rollout.outcome,
                rollout.steps.len()
            );

            if solved || attempts >= self.config.max_attempts {
                return Ok(SolveReport {
                    solved,
                    attempts,
                    resets,
                    training,
                    rollout,
                });
            }

            since_reset += 1;
            if self.config.attempts_before_reset > 0
                && since_reset >= self.config.attempts_before_reset
            {
                log::warn!("no solution after {since_reset} attempts, rebuilding tables");
                self.reset_tables();
                resets += 1;
                since_reset = 0;
            }
        }
    }
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("scenario", &self.scenario)
            .field("counters", &self.counters)
            .field("tick", &self.tick)
            .field("positions", &self.positions)
            .finish_non_exhaustive()
    }
}
