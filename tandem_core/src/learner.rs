//! Temporal-difference update and its learning-rate schedule.

use crate::{Action, Position, error::LookupError, q_table::QTable};

/// Off-policy TD control with a fixed discount factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QLearner {
    gamma: f64,
}

impl QLearner {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// `r + γ · best_next`
    pub fn target(&self, reward: f64, best_next: f64) -> f64 {
        reward + self.gamma * best_next
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// Writes the new value into the table and returns it.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        table: &mut QTable,
        own: Position,
        partner: Position,
        action: Action,
        alpha: f64,
        reward: f64,
        best_next: f64,
    ) -> Result<f64, LookupError> {
        let old = table.value(own, partner, action)?;
        let new = old + alpha * (self.target(reward, best_next) - old);
        table.set(own, partner, action, new)?;
        Ok(new)
    }
}

/// Learning rate `tick^-decay`, where the tick counts every step of the run.
///
/// With `0 < decay <= 1` the rates sum to infinity, and for `decay > 0.5`
/// their squares stay finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRate {
    decay: f64,
}

impl LearningRate {
    pub fn new(decay: f64) -> Self {
        Self { decay }
    }

    /// Rate for the given tick, counted from 1.
    pub fn alpha(&self, tick: u64) -> f64 {
        (tick.max(1) as f64).powf(-self.decay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::PartnerCoverage, q_table::TableLayout, room::Room};

    fn table() -> QTable {
        let room = Room::from_rows(vec![vec![0.0, 0.0, Room::GOAL_REWARD]]).unwrap();
        QTable::build(
            &room,
            TableLayout {
                shift: 1,
                coverage: PartnerCoverage::FullGrid,
                include_stay: true,
                initial_value: 0.0,
            },
        )
    }

    const OWN: Position = Position::new(0, 0);
    const PARTNER: Position = Position::new(1, 0);

    #[test]
    fn update_applies_the_td_rule() {
        let mut table = table();
        table.set(OWN, PARTNER, Action::Right, 2.0).unwrap();
        let learner = QLearner::new(0.8);
        let new = learner
            .update(&mut table, OWN, PARTNER, Action::Right, 0.5, -0.1, 10.0)
            .unwrap();
        // 2 + 0.5 * (-0.1 + 8 - 2)
        assert!((new - 4.95).abs() < 1e-12);
        assert_eq!(table.value(OWN, PARTNER, Action::Right), Ok(new));
    }

    #[test]
    fn repeated_updates_approach_the_target_monotonically() {
        let mut table = table();
        let learner = QLearner::new(0.9);
        let target = learner.target(-0.1, 5.0);
        let mut previous_gap = f64::INFINITY;
        for _ in 0..200 {
            let value = learner
                .update(&mut table, OWN, PARTNER, Action::Stay, 0.1, -0.1, 5.0)
                .unwrap();
            let gap = (target - value).abs();
            assert!(gap < previous_gap);
            assert!(value <= target);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-6);
    }

    #[test]
    fn zero_alpha_leaves_the_value_alone() {
        let mut table = table();
        table.set(OWN, PARTNER, Action::Stay, 1.5).unwrap();
        let value = QLearner::new(0.8)
            .update(&mut table, OWN, PARTNER, Action::Stay, 0.0, 100.0, 50.0)
            .unwrap();
        assert_eq!(value, 1.5);
    }

    #[test]
    fn update_on_a_missing_action_fails() {
        let mut table = table();
        let err = QLearner::new(0.8)
            .update(&mut table, OWN, PARTNER, Action::Left, 0.5, 0.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, LookupError::MissingAction { .. }));
    }

    #[test]
    fn learning_rate_decays_with_ticks() {
        let rate = LearningRate::new(0.1);
        assert_eq!(rate.alpha(1), 1.0);
        assert_eq!(rate.alpha(0), 1.0);
        assert!((rate.alpha(1024) - 0.5).abs() < 1e-12);
        let mut last = rate.alpha(1);
        for tick in 2..1000 {
            let alpha = rate.alpha(tick);
            assert!(alpha < last && alpha > 0.0);
            last = alpha;
        }
    }
}
