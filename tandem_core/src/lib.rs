use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod learner;
pub mod map;
pub mod observer;
pub mod policy;
pub mod q_table;
pub mod reward;
pub mod room;
pub mod scenario;
pub mod trainer;

pub use config::{PartnerCoverage, RewardConfig, RunConfig, ScenarioConfig, TrainingConfig};
pub use error::{ConfigError, Error, LookupError, Result};
pub use room::{CellKind, Room};
pub use scenario::Scenario;
pub use trainer::{
    EpisodeCounters, Rollout, RolloutOutcome, RolloutStep, SolveReport, StopReason, Trainer,
    TrainingReport,
};

/// Number of agents sharing the room.
pub const AGENT_COUNT: usize = 2;

/// Index of the other agent of the pair.
#[inline]
pub fn partner_of(agent: usize) -> usize {
    1 - agent
}

/// Represents a 2D coordinate.
///
/// Identity is the (x, y) pair only; which move produced a position is never
/// part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Euclidean distance between two positions.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A move an agent can make in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Stay,
    Left,
    Right,
    Up,
    Down,
}

impl Action {
    /// The four directional moves.
    pub const MOVES: [Action; 4] = [Action::Left, Action::Right, Action::Up, Action::Down];

    /// Every action, `Stay` first.
    pub const ALL: [Action; 5] = [
        Action::Stay,
        Action::Left,
        Action::Right,
        Action::Up,
        Action::Down,
    ];

    /// Returns the position reached from `position` when moving `shift` cells.
    ///
    /// Returns `None` when the move would leave the non-negative quadrant.
    /// Upper grid bounds are the room's concern.
    pub fn apply(self, position: Position, shift: usize) -> Option<Position> {
        let Position { x, y } = position;
        match self {
            Action::Stay => Some(position),
            Action::Left => x.checked_sub(shift).map(|x| Position { x, y }),
            Action::Right => x.checked_add(shift).map(|x| Position { x, y }),
            Action::Up => y.checked_sub(shift).map(|y| Position { x, y }),
            Action::Down => y.checked_add(shift).map(|y| Position { x, y }),
        }
    }

    /// Short lowercase label.
    pub fn label(self) -> &'static str {
        match self {
            Action::Stay => "stay",
            Action::Left => "left",
            Action::Right => "right",
            Action::Up => "up",
            Action::Down => "down",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An agent: where it starts and how far one action carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub start: Position,
    pub shift: usize,
}

impl AgentSpec {
    pub const fn new(start: Position, shift: usize) -> Self {
        AgentSpec { start, shift }
    }
}
