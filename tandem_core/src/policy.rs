//! Epsilon-greedy action selection over a joint-state value table.

use rand::{Rng, seq::IndexedRandom};

use crate::{Action, Position, error::LookupError, q_table::QTable};

/// Explores with probability `epsilon`, otherwise picks a best-valued action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonGreedy {
    epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Chooses the next action for the agent at `own` whose partner is at
    /// `partner`.
    ///
    /// With `explore` set, a uniform draw below epsilon picks any action of
    /// the entry at random. Otherwise one of the actions holding the maximum
    /// value is returned, ties broken uniformly at random.
    pub fn choose_action<R: Rng + ?Sized>(
        &self,
        table: &QTable,
        own: Position,
        partner: Position,
        explore: bool,
        rng: &mut R,
    ) -> Result<Action, LookupError> {
        let entry = table.entry(own, partner)?;
        let empty = LookupError::EmptyEntry {
            self_state: own,
            partner,
        };

        if explore && rng.random::<f64>() < self.epsilon {
            let actions: Vec<Action> = entry.keys().copied().collect();
            return actions.choose(rng).copied().ok_or(empty);
        }

        let best = entry
            .values()
            .copied()
            .reduce(f64::max)
            .ok_or_else(|| empty.clone())?;
        let ties: Vec<Action> = entry
            .iter()
            .filter(|(_, value)| **value == best)
            .map(|(action, _)| *action)
            .collect();
        ties.choose(rng).copied().ok_or(empty)
    }
}
