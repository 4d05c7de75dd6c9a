//! The static reward map both agents walk on.

use serde::{Deserialize, Serialize};

use crate::{Action, Position, config::PartnerCoverage, error::ConfigError, map::Grid};

/// Classification of a room cell, derived from its reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Free,
    Hazard,
    Goal,
}

impl CellKind {
    pub fn label(self) -> &'static str {
        match self {
            CellKind::Free => "free",
            CellKind::Hazard => "hazard",
            CellKind::Goal => "goal",
        }
    }
}

/// A fixed rectangular matrix of cell rewards with exactly one goal.
///
/// The room never changes once built; training only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    rewards: Grid<f64>,
    goal: Position,
}

impl Room {
    /// Reward of a hazard cell.
    pub const HAZARD_REWARD: f64 = -100.0;
    /// Reward of the goal cell.
    pub const GOAL_REWARD: f64 = 100.0;
    /// Reward of a free cell.
    pub const FREE_REWARD: f64 = 0.0;

    /// Builds a room from rows of rewards, top row first.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ConfigError> {
        let rewards = Grid::from_rows(rows)?;

        let mut goal = None;
        for (position, reward) in rewards.enumerate() {
            if *reward == Self::GOAL_REWARD {
                if let Some(first) = goal {
                    return Err(ConfigError::DuplicateGoal {
                        first,
                        second: position,
                    });
                }
                goal = Some(position);
            }
        }
        let goal = goal.ok_or(ConfigError::MissingGoal)?;

        Ok(Room { rewards, goal })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.rewards.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.rewards.height()
    }

    /// The single goal cell.
    pub fn goal(&self) -> Position {
        self.goal
    }

    /// Checks if the position lies inside the room.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        self.rewards.contains(position)
    }

    /// Returns the reward stored for the cell.
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside the room. Callers only query positions
    /// reached through legal actions.
    pub fn reward_at(&self, position: Position) -> f64 {
        self.rewards[position]
    }

    pub fn cell_kind(&self, position: Position) -> CellKind {
        let reward = self.reward_at(position);
        if reward == Self::HAZARD_REWARD {
            CellKind::Hazard
        } else if reward == Self::GOAL_REWARD {
            CellKind::Goal
        } else {
            CellKind::Free
        }
    }

    pub fn is_hazard(&self, position: Position) -> bool {
        self.cell_kind(position) == CellKind::Hazard
    }

    pub fn is_goal(&self, position: Position) -> bool {
        self.cell_kind(position) == CellKind::Goal
    }

    /// Every cell of the room in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        self.rewards.positions()
    }

    /// Actions that keep an agent with the given shift inside the room.
    ///
    /// `Stay` comes first when included and is always legal.
    pub fn legal_actions(&self, position: Position, shift: usize, include_stay: bool) -> Vec<Action> {
        let mut actions = Vec::with_capacity(Action::ALL.len());
        if include_stay {
            actions.push(Action::Stay);
        }
        actions.extend(Action::MOVES.into_iter().filter(|action| {
            action
                .apply(position, shift)
                .is_some_and(|target| self.contains(target))
        }));
        actions
    }

    /// Partner positions a value table keeps for the own position `center`.
    pub fn partner_positions(&self, center: Position, coverage: PartnerCoverage) -> Vec<Position> {
        match coverage {
            PartnerCoverage::FullGrid => self.positions().collect(),
            PartnerCoverage::Neighborhood { radius } => {
                let x_range = center.x.saturating_sub(radius)
                    ..=center.x.saturating_add(radius).min(self.width() - 1);
                let y_range = center.y.saturating_sub(radius)
                    ..=center.y.saturating_add(radius).min(self.height() - 1);
                y_range
                    .flat_map(|y| x_range.clone().map(move |x| Position { x, y }))
                    .collect()
            }
        }
    }
}
