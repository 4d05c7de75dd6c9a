use crate::{
    AGENT_COUNT, AgentSpec, Position,
    config::ScenarioConfig,
    error::ConfigError,
    room::{CellKind, Room},
};

/// The 16x9 room the pair is trained on by default.
///
/// A wall of hazards in column six leaves a gap in rows four to seven, a
/// second wall in column thirteen is open at the top, and the bottom row
/// is a hazard strip ending at the goal in the lower right corner.
pub const CANONICAL_LAYOUT: &str = "
. . . . . . X . . . . . . . . .
. . . . . . X . . . . . . . . .
. . . . . . X . . . . . . X . .
. . . . . . X . . . . . . X . .
. . . . . . . . . . . . . X . .
. . . . . . . . . . . . . X . .
. . . . . . . . . . . . . X . .
. . . . . . . . . . . . . X . .
A B X X X X X X X X X X X X . G
";

/// Start markers of agent one and agent two.
const START_MARKERS: [char; AGENT_COUNT] = ['A', 'B'];

/// A room plus the two agents that train in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub room: Room,
    pub agents: [AgentSpec; AGENT_COUNT],
}

impl Scenario {
    /// Pairs a room with two agents.
    ///
    /// Each agent must start inside the room, on a free cell, with a non-zero
    /// shift.
    pub fn new(room: Room, agents: [AgentSpec; AGENT_COUNT]) -> Result<Self, ConfigError> {
        for (agent, spec) in agents.iter().enumerate() {
            if spec.shift == 0 {
                return Err(ConfigError::ZeroShift { agent });
            }
            if !room.contains(spec.start) {
                return Err(ConfigError::StartOutOfBounds {
                    agent,
                    position: spec.start,
                    width: room.width(),
                    height: room.height(),
                });
            }
            let kind = room.cell_kind(spec.start);
            if kind != CellKind::Free {
                return Err(ConfigError::StartOnTerminal {
                    agent,
                    position: spec.start,
                    kind: kind.label(),
                });
            }
        }
        Ok(Scenario { room, agents })
    }

    /// Parses a layout string into a scenario.
    ///
    /// The layout has one line per row and whitespace separated tokens:
    ///
    /// * `.` free cell
    /// * `X` hazard
    /// * `G` goal
    /// * `A` / `B` start of agent one / two, on a free cell
    /// * any number, taken as the raw cell reward
    pub fn parse(layout: &str, shifts: [usize; AGENT_COUNT]) -> Result<Self, ConfigError> {
        let mut rows = Vec::new();
        let mut starts: [Option<Position>; AGENT_COUNT] = [None; AGENT_COUNT];

        for (y, line) in layout.trim().lines().enumerate() {
            let mut row = Vec::new();
            for (x, token) in line.split_whitespace().enumerate() {
                let position = Position { x, y };
                let reward = match token {
                    "." => Room::FREE_REWARD,
                    "X" => Room::HAZARD_REWARD,
                    "G" => Room::GOAL_REWARD,
                    "A" | "B" => {
                        let agent = if token == "A" { 0 } else { 1 };
                        if let Some(first) = starts[agent] {
                            return Err(ConfigError::DuplicateStart {
                                marker: START_MARKERS[agent],
                                first,
                                second: position,
                            });
                        }
                        starts[agent] = Some(position);
                        Room::FREE_REWARD
                    }
                    other => other.parse::<f64>().map_err(|_| ConfigError::UnknownToken {
                        token: other.to_string(),
                        x,
                        y,
                    })?,
                };
                row.push(reward);
            }
            rows.push(row);
        }

        let room = Room::from_rows(rows)?;
        let mut agents = [AgentSpec::new(Position::new(0, 0), 0); AGENT_COUNT];
        for (agent, spec) in agents.iter_mut().enumerate() {
            let start = starts[agent].ok_or(ConfigError::MissingStart {
                marker: START_MARKERS[agent],
            })?;
            *spec = AgentSpec::new(start, shifts[agent]);
        }
        Scenario::new(room, agents)
    }

    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        Self::parse(&config.layout, config.shifts)
    }

    /// The default room with agent one at (0, 8), shift 1, and agent two at
    /// (1, 8), shift 2.
    pub fn canonical() -> Result<Self, ConfigError> {
        Self::from_config(&ScenarioConfig::default())
    }

    pub fn starts(&self) -> [Position; AGENT_COUNT] {
        [self.agents[0].start, self.agents[1].start]
    }

    pub fn shifts(&self) -> [usize; AGENT_COUNT] {
        [self.agents[0].shift, self.agents[1].shift]
    }
}
