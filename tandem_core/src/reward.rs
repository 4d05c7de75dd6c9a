//! Scores a proposed joint move and decides whether the episode ends.

use crate::{AGENT_COUNT, Position, config::RewardConfig, partner_of, room::Room};

/// Why an agent received the death reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeathCause {
    /// The two new positions are too far apart.
    Separated,
    /// The agent's new position is too far from where its partner stood.
    Strayed,
    /// The agent stepped onto a hazard.
    Hazard,
}

impl DeathCause {
    /// Whether the death follows from the agent's own joint state and action
    /// alone, whatever its partner does in the same step.
    pub fn is_certain(self) -> bool {
        matches!(self, DeathCause::Strayed | DeathCause::Hazard)
    }
}

/// How a scored step affects the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Win,
    Fail,
}

/// Rewards and terminal signal of one joint step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub rewards: [f64; AGENT_COUNT],
    pub deaths: [Option<DeathCause>; AGENT_COUNT],
    pub win: bool,
    pub fail: bool,
}

impl StepOutcome {
    pub fn restart(&self) -> bool {
        self.win || self.fail
    }

    /// Failure outranks a win reached in the same step.
    pub fn verdict(&self) -> Verdict {
        if self.fail {
            Verdict::Fail
        } else if self.win {
            Verdict::Win
        } else {
            Verdict::Continue
        }
    }
}

/// The reward function shared by both agents.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardModel {
    config: RewardConfig,
}

impl RewardModel {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    fn too_far(&self, a: Position, b: Position) -> bool {
        a.distance(&b) > self.config.proximity_threshold
    }

    /// Scores the move from `previous` to `next`.
    ///
    /// Rules are applied in order, a later rule overriding an earlier reward:
    /// walk cost, collision, goal, separation, hazard.
    pub fn evaluate(
        &self,
        room: &Room,
        next: [Position; AGENT_COUNT],
        previous: [Position; AGENT_COUNT],
    ) -> StepOutcome {
        let mut rewards = [self.config.walk; AGENT_COUNT];
        let mut deaths = [None; AGENT_COUNT];
        let mut win = false;
        let mut fail = false;

        if next[0] == next[1] {
            rewards = [self.config.collision; AGENT_COUNT];
        }

        if next.iter().any(|position| room.is_goal(*position)) {
            rewards = [self.config.win; AGENT_COUNT];
            win = true;
        }

        if self.too_far(next[0], next[1]) {
            rewards = [self.config.death; AGENT_COUNT];
            deaths = [Some(DeathCause::Separated); AGENT_COUNT];
            fail = true;
        }

        for agent in 0..AGENT_COUNT {
            if self.too_far(next[agent], previous[partner_of(agent)]) {
                rewards[agent] = self.config.death;
                deaths[agent] = Some(DeathCause::Strayed);
                fail = true;
            }
        }

        for agent in 0..AGENT_COUNT {
            if room.is_hazard(next[agent]) {
                rewards[agent] = self.config.death;
                deaths[agent] = Some(DeathCause::Hazard);
                fail = true;
            }
        }

        StepOutcome {
            rewards,
            deaths,
            win,
            fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: f64 = Room::HAZARD_REWARD;
    const G: f64 = Room::GOAL_REWARD;

    fn room() -> Room {
        Room::from_rows(vec![
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, X, 0.0, 0.0, G],
        ])
        .unwrap()
    }

    fn model() -> RewardModel {
        RewardModel::new(RewardConfig::default())
    }

    fn p(x: usize, y: usize) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn ordinary_step_costs_the_walk_reward() {
        let outcome = model().evaluate(&room(), [p(1, 0), p(1, 1)], [p(0, 0), p(0, 1)]);
        assert_eq!(outcome.rewards, [-0.1, -0.1]);
        assert_eq!(outcome.deaths, [None, None]);
        assert!(!outcome.restart());
        assert_eq!(outcome.verdict(), Verdict::Continue);
    }

    #[test]
    fn sharing_a_cell_costs_the_collision_reward() {
        let outcome = model().evaluate(&room(), [p(1, 0), p(1, 0)], [p(0, 0), p(1, 1)]);
        assert_eq!(outcome.rewards, [-1.0, -1.0]);
        assert!(!outcome.restart());
    }

    #[test]
    fn either_agent_on_the_goal_wins_for_both() {
        let outcome = model().evaluate(&room(), [p(4, 0), p(5, 1)], [p(4, 0), p(4, 1)]);
        assert_eq!(outcome.rewards, [100.0, 100.0]);
        assert!(outcome.win);
        assert!(outcome.restart());
        assert_eq!(outcome.verdict(), Verdict::Win);
    }

    #[test]
    fn separated_agents_both_die() {
        // (0, 0) and (4, 1) are sqrt(17) apart.
        let outcome = model().evaluate(&room(), [p(0, 0), p(4, 1)], [p(2, 0), p(1, 0)]);
        assert_eq!(outcome.rewards, [-100.0, -100.0]);
        assert_eq!(
            outcome.deaths,
            [Some(DeathCause::Separated), Some(DeathCause::Separated)]
        );
        assert!(outcome.fail);
        assert_eq!(outcome.verdict(), Verdict::Fail);
    }

    #[test]
    fn straying_from_the_partner_previous_cell_fails_that_agent() {
        // New positions are 3 apart, but agent two moved from (0, 0) and
        // agent one now stands 4 away from there.
        let outcome = model().evaluate(&room(), [p(4, 0), p(1, 0)], [p(3, 0), p(0, 0)]);
        assert_eq!(outcome.rewards, [-100.0, -0.1]);
        assert_eq!(outcome.deaths, [Some(DeathCause::Strayed), None]);
        assert!(outcome.fail);
    }

    #[test]
    fn hazard_fails_only_the_agent_on_it() {
        let outcome = model().evaluate(&room(), [p(2, 1), p(2, 0)], [p(1, 1), p(1, 0)]);
        assert_eq!(outcome.rewards, [-100.0, -0.1]);
        assert_eq!(outcome.deaths, [Some(DeathCause::Hazard), None]);
        assert!(outcome.restart());
    }

    #[test]
    fn failure_outranks_a_simultaneous_win() {
        let room = Room::from_rows(vec![vec![0.0, X, G]]).unwrap();
        let outcome = model().evaluate(&room, [p(1, 0), p(2, 0)], [p(0, 0), p(1, 0)]);
        assert!(outcome.win);
        assert!(outcome.fail);
        assert_eq!(outcome.rewards, [-100.0, 100.0]);
        assert_eq!(outcome.verdict(), Verdict::Fail);
    }

    #[test]
    fn any_pair_beyond_the_threshold_fails_someone() {
        let room = Room::from_rows(vec![vec![0.0; 8], vec![0.0; 7].into_iter().chain([G]).collect()])
            .unwrap();
        let model = model();
        for a in room.positions() {
            for b in room.positions() {
                if a.distance(&b) > 3.0 {
                    let outcome = model.evaluate(&room, [a, b], [a, b]);
                    assert!(outcome.fail, "{a} and {b}");
                    assert!(outcome.deaths.iter().any(Option::is_some));
                }
            }
        }
    }

    #[test]
    fn only_certain_deaths_are_certain() {
        assert!(DeathCause::Hazard.is_certain());
        assert!(DeathCause::Strayed.is_certain());
        assert!(!DeathCause::Separated.is_certain());
    }
}
