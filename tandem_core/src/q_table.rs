//! Joint-state value table: own position -> partner position -> action -> value.

use std::collections::{BTreeMap, HashMap};

use crate::{
    Action, Position,
    config::PartnerCoverage,
    error::LookupError,
    room::Room,
};

/// Values of the actions available in one joint state.
///
/// Ordered by action so that iteration, and therefore seeded tie-breaking,
/// is reproducible.
pub type ActionValues = BTreeMap<Action, f64>;

/// How a table is laid out when built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableLayout {
    /// Shift of the agent owning the table.
    pub shift: usize,
    pub coverage: PartnerCoverage,
    pub include_stay: bool,
    pub initial_value: f64,
}

/// Result of asking the table to forget an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pruned {
    Removed,
    /// The action was the last one left and stays in place.
    KeptLast,
    /// The action had already been removed.
    Absent,
}

/// One agent's value table, keyed by its own position and its partner's.
#[derive(Debug, Clone)]
pub struct QTable {
    entries: HashMap<Position, HashMap<Position, ActionValues>>,
    initial_value: f64,
}

impl QTable {
    /// Builds a table holding every legal action of every own position,
    /// for every partner position the coverage keeps.
    pub fn build(room: &Room, layout: TableLayout) -> Self {
        let mut entries = HashMap::with_capacity(room.width() * room.height());
        for own in room.positions() {
            let template: ActionValues = room
                .legal_actions(own, layout.shift, layout.include_stay)
                .into_iter()
                .map(|action| (action, layout.initial_value))
                .collect();
            let partners: HashMap<Position, ActionValues> = room
                .partner_positions(own, layout.coverage)
                .into_iter()
                .map(|partner| (partner, template.clone()))
                .collect();
            entries.insert(own, partners);
        }

        let table = QTable {
            entries,
            initial_value: layout.initial_value,
        };
        log::debug!(
            "built table for shift {}: {} own states, {} joint states, {} values",
            layout.shift,
            table.entries.len(),
            table.joint_state_count(),
            table.value_count()
        );
        table
    }

    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    pub fn contains(&self, own: Position, partner: Position) -> bool {
        self.entries
            .get(&own)
            .is_some_and(|partners| partners.contains_key(&partner))
    }

    /// Action values of a joint state.
    pub fn entry(&self, own: Position, partner: Position) -> Result<&ActionValues, LookupError> {
        self.entries
            .get(&own)
            .and_then(|partners| partners.get(&partner))
            .ok_or(LookupError::MissingState {
                self_state: own,
                partner,
            })
    }

    fn entry_mut(
        &mut self,
        own: Position,
        partner: Position,
    ) -> Result<&mut ActionValues, LookupError> {
        self.entries
            .get_mut(&own)
            .and_then(|partners| partners.get_mut(&partner))
            .ok_or(LookupError::MissingState {
                self_state: own,
                partner,
            })
    }

    /// Stored value of one action in a joint state.
    pub fn value(&self, own: Position, partner: Position, action: Action) -> Result<f64, LookupError> {
        self.entry(own, partner)?
            .get(&action)
            .copied()
            .ok_or(LookupError::MissingAction {
                self_state: own,
                partner,
                action,
            })
    }

    /// Overwrites the value of an action already present in the table.
    pub fn set(
        &mut self,
        own: Position,
        partner: Position,
        action: Action,
        value: f64,
    ) -> Result<(), LookupError> {
        let slot = self
            .entry_mut(own, partner)?
            .get_mut(&action)
            .ok_or(LookupError::MissingAction {
                self_state: own,
                partner,
                action,
            })?;
        *slot = value;
        Ok(())
    }

    /// Largest value over the actions of a joint state.
    pub fn max_value(&self, own: Position, partner: Position) -> Result<f64, LookupError> {
        self.entry(own, partner)?
            .values()
            .copied()
            .reduce(f64::max)
            .ok_or(LookupError::EmptyEntry {
                self_state: own,
                partner,
            })
    }

    /// Removes an action from a joint state for good.
    ///
    /// The last action of an entry is never removed, so every joint state
    /// keeps something to choose from.
    pub fn prune(
        &mut self,
        own: Position,
        partner: Position,
        action: Action,
    ) -> Result<Pruned, LookupError> {
        let actions = self.entry_mut(own, partner)?;
        if !actions.contains_key(&action) {
            return Ok(Pruned::Absent);
        }
        if actions.len() == 1 {
            return Ok(Pruned::KeptLast);
        }
        actions.remove(&action);
        Ok(Pruned::Removed)
    }

    /// Number of own positions.
    pub fn state_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of (own, partner) entries.
    pub fn joint_state_count(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Number of stored action values.
    pub fn value_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(HashMap::values)
            .map(BTreeMap::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::from_rows(vec![
            vec![0.0, 0.0, 0.0],
            vec![0.0, Room::HAZARD_REWARD, Room::GOAL_REWARD],
        ])
        .unwrap()
    }

    fn layout(shift: usize) -> TableLayout {
        TableLayout {
            shift,
            coverage: PartnerCoverage::FullGrid,
            include_stay: true,
            initial_value: 0.0,
        }
    }

    #[test]
    fn build_covers_every_joint_state_with_legal_actions() {
        let room = room();
        let table = QTable::build(&room, layout(1));
        assert_eq!(table.state_count(), 6);
        assert_eq!(table.joint_state_count(), 36);
        for own in room.positions() {
            let legal = room.legal_actions(own, 1, true);
            for partner in room.positions() {
                let actions: Vec<Action> = table.entry(own, partner).unwrap().keys().copied().collect();
                let mut expected = legal.clone();
                expected.sort();
                assert_eq!(actions, expected);
            }
        }
        assert_eq!(table.value(Position::new(0, 0), Position::new(2, 1), Action::Stay), Ok(0.0));
    }

    #[test]
    fn neighborhood_limits_partner_states() {
        let room = room();
        let table = QTable::build(
            &room,
            TableLayout {
                coverage: PartnerCoverage::Neighborhood { radius: 1 },
                ..layout(1)
            },
        );
        assert!(table.contains(Position::new(0, 0), Position::new(1, 1)));
        assert!(!table.contains(Position::new(0, 0), Position::new(2, 0)));
        assert_eq!(
            table.entry(Position::new(0, 0), Position::new(2, 0)),
            Err(LookupError::MissingState {
                self_state: Position::new(0, 0),
                partner: Position::new(2, 0)
            })
        );
    }

    #[test]
    fn set_and_max_value() {
        let mut table = QTable::build(&room(), layout(1));
        let (own, partner) = (Position::new(1, 0), Position::new(0, 0));
        table.set(own, partner, Action::Left, -3.0).unwrap();
        table.set(own, partner, Action::Right, 2.5).unwrap();
        assert_eq!(table.value(own, partner, Action::Right), Ok(2.5));
        assert_eq!(table.max_value(own, partner), Ok(2.5));
        assert_eq!(
            table.set(own, partner, Action::Up, 1.0),
            Err(LookupError::MissingAction {
                self_state: own,
                partner,
                action: Action::Up
            })
        );
    }

    #[test]
    fn prune_keeps_the_last_action() {
        let mut table = QTable::build(&room(), layout(1));
        let (own, partner) = (Position::new(0, 0), Position::new(1, 0));
        assert_eq!(table.entry(own, partner).unwrap().len(), 3);

        assert_eq!(table.prune(own, partner, Action::Right), Ok(Pruned::Removed));
        assert_eq!(table.prune(own, partner, Action::Right), Ok(Pruned::Absent));
        assert_eq!(table.prune(own, partner, Action::Down), Ok(Pruned::Removed));
        assert_eq!(table.prune(own, partner, Action::Stay), Ok(Pruned::KeptLast));

        let left: Vec<Action> = table.entry(own, partner).unwrap().keys().copied().collect();
        assert_eq!(left, vec![Action::Stay]);
        assert!(table.max_value(own, partner).is_ok());

        // Other joint states of the same own position are untouched.
        assert_eq!(table.entry(own, Position::new(2, 0)).unwrap().len(), 3);
    }
}
