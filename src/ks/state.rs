use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::ks::category::{CategoryRef, RankOrder};
use crate::ks::{state_id, KsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateType {
    Root,
    #[default]
    Core,
    Expanded,
}

impl StateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateType::Root => "root",
            StateType::Core => "core",
            StateType::Expanded => "expanded",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateType {
    type Err = KsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(StateType::Root),
            "core" => Ok(StateType::Core),
            "expanded" => Ok(StateType::Expanded),
            other => Err(KsError::Xml(format!("invalid state type: {other}"))),
        }
    }
}

/// Position of a state in its structure's arena.
pub type StateId = usize;

/// A set of categories a learner can master together. Links to neighbouring
/// states are arena ids owned by the enclosing [`KStructure`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KState {
    id: String,
    state_type: StateType,
    categories: Vec<CategoryRef>,
    prev_states: Vec<StateId>,
    next_states: Vec<StateId>,
}

impl KState {
    pub fn new(state_type: StateType) -> Self {
        Self {
            state_type,
            ..Self::default()
        }
    }

    pub fn with_id(id: impl Into<String>, state_type: StateType) -> Self {
        Self {
            id: id.into(),
            state_type,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn is_same_id(&self, id: &str) -> bool {
        self.id == id
    }

    pub fn state_type(&self) -> StateType {
        self.state_type
    }

    /// Turning a state into the root drops all of its links.
    pub fn set_state_type(&mut self, state_type: StateType) {
        self.state_type = state_type;
        if state_type == StateType::Root {
            self.prev_states.clear();
            self.next_states.clear();
        }
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn categories(&self) -> &[CategoryRef] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&CategoryRef> {
        self.categories.iter().find(|c| c.is_same_id(id))
    }

    pub fn has_category(&self, id: &str) -> bool {
        self.category(id).is_some()
    }

    /// The root stays empty and ids are unique within a state.
    pub fn add_category(&mut self, category: CategoryRef) -> bool {
        if self.state_type == StateType::Root || self.has_category(category.id()) {
            return false;
        }
        self.categories.push(category);
        true
    }

    pub fn remove_category_by_id(&mut self, id: &str) -> bool {
        match self.categories.iter().position(|c| c.is_same_id(id)) {
            Some(pos) => {
                self.categories.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn remove_category(&mut self, category: &CategoryRef) -> bool {
        match self.categories.iter().position(|c| Arc::ptr_eq(c, category)) {
            Some(pos) => {
                self.categories.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Compares category ids; the empty state is a subset of everything.
    pub fn is_subset_of(&self, other: &KState) -> bool {
        self.categories.iter().all(|c| other.has_category(c.id()))
    }

    pub fn has_same_categories(&self, other: &KState) -> bool {
        self.category_count() == other.category_count() && self.is_subset_of(other)
    }

    /// `(a,b,c)`
    pub fn name(&self) -> String {
        let ids: Vec<&str> = self.categories.iter().map(|c| c.id()).collect();
        format!("({})", ids.join(","))
    }

    pub fn prev_states(&self) -> &[StateId] {
        &self.prev_states
    }

    pub fn next_states(&self) -> &[StateId] {
        &self.next_states
    }

    /// No-op on the root.
    pub fn add_prev_state(&mut self, prev: StateId) {
        if self.state_type != StateType::Root && !self.prev_states.contains(&prev) {
            self.prev_states.push(prev);
        }
    }

    pub fn add_next_state(&mut self, next: StateId) {
        if !self.next_states.contains(&next) {
            self.next_states.push(next);
        }
    }

    pub fn remove_prev_state(&mut self, prev: StateId) -> bool {
        let before = self.prev_states.len();
        self.prev_states.retain(|&s| s != prev);
        self.prev_states.len() != before
    }

    pub fn remove_next_state(&mut self, next: StateId) -> bool {
        let before = self.next_states.len();
        self.next_states.retain(|&s| s != next);
        self.next_states.len() != before
    }
}

/// States of one size. Rank 0 holds only the root.
#[derive(Debug, Clone, PartialEq)]
pub struct KSRank {
    index: u32,
    states: Vec<StateId>,
}

impl KSRank {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state_at(&self, pos: usize) -> Option<StateId> {
        self.states.get(pos).copied()
    }
}

/// Knowledge structure: an arena of states bucketed into ranks by size,
/// together with the rank order its categories come from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KStructure {
    rank_order: Option<RankOrder>,
    ranks: Vec<KSRank>,
    states: Vec<KState>,
}

impl KStructure {
    pub fn new(rank_order: RankOrder) -> Self {
        Self {
            rank_order: Some(rank_order),
            ..Self::default()
        }
    }

    pub fn rank_order(&self) -> Option<&RankOrder> {
        self.rank_order.as_ref()
    }

    pub fn set_rank_order(&mut self, rank_order: RankOrder) {
        self.rank_order = Some(rank_order);
    }

    pub fn has_rank_order(&self) -> bool {
        self.rank_order.as_ref().is_some_and(|o| o.rank_count() > 0)
    }

    pub fn has_ranks(&self) -> bool {
        !self.ranks.is_empty()
    }

    pub fn rank_count(&self) -> usize {
        self.ranks.len()
    }

    pub fn ranks(&self) -> &[KSRank] {
        &self.ranks
    }

    pub fn rank(&self, index: u32) -> Option<&KSRank> {
        self.ranks.iter().find(|r| r.index == index)
    }

    pub fn rank_at(&self, pos: usize) -> Option<&KSRank> {
        self.ranks.get(pos)
    }

    /// Adds an empty rank, keeping ranks sorted. Rank 0 comes with its root
    /// state `S0.1`. Returns `false` if the rank already exists.
    pub fn add_rank(&mut self, index: u32) -> bool {
        if self.rank(index).is_some() {
            return false;
        }
        let mut rank = KSRank {
            index,
            states: Vec::new(),
        };
        if index == 0 {
            rank.states.push(self.states.len());
            self.states.push(KState::with_id(state_id(0, 1), StateType::Root));
        }
        let pos = self.ranks.partition_point(|r| r.index < index);
        self.ranks.insert(pos, rank);
        true
    }

    /// Places `state` in the rank with index `rank_index`. Fails for rank 0,
    /// a size that does not match the rank, a missing rank, or a state with
    /// the same category set already in the rank.
    pub fn add_state(&mut self, rank_index: u32, state: KState) -> Option<StateId> {
        if rank_index == 0 || state.category_count() != rank_index as usize {
            return None;
        }
        let pos = self.ranks.iter().position(|r| r.index == rank_index)?;
        let duplicate = self.ranks[pos]
            .states
            .iter()
            .any(|&s| self.states[s].has_same_categories(&state));
        if duplicate {
            return None;
        }
        let id = self.states.len();
        self.states.push(state);
        self.ranks[pos].states.push(id);
        Some(id)
    }

    pub fn state(&self, id: StateId) -> Option<&KState> {
        self.states.get(id)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut KState> {
        self.states.get_mut(id)
    }

    pub fn state_by_id(&self, id: &str) -> Option<StateId> {
        self.states.iter().position(|s| s.is_same_id(id))
    }

    pub fn states(&self) -> &[KState] {
        &self.states
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn root(&self) -> Option<StateId> {
        self.rank(0).and_then(|r| r.state_at(0))
    }

    pub fn states_in_rank(&self, index: u32) -> Vec<&KState> {
        self.rank(index)
            .map(|r| r.states.iter().filter_map(|&s| self.states.get(s)).collect())
            .unwrap_or_default()
    }

    /// Records `prev` as a prerequisite of `next`.
    pub fn link(&mut self, prev: StateId, next: StateId) {
        if prev >= self.states.len() || next >= self.states.len() || prev == next {
            return;
        }
        self.states[next].add_prev_state(prev);
        self.states[prev].add_next_state(next);
    }

    pub fn is_subset(&self, a: StateId, b: StateId) -> bool {
        match (self.states.get(a), self.states.get(b)) {
            (Some(a), Some(b)) => a.is_subset_of(b),
            _ => false,
        }
    }

    pub fn prev_states_of(&self, id: StateId) -> Vec<&KState> {
        self.neighbours(id, KState::prev_states)
    }

    pub fn next_states_of(&self, id: StateId) -> Vec<&KState> {
        self.neighbours(id, KState::next_states)
    }

    fn neighbours(&self, id: StateId, select: fn(&KState) -> &[StateId]) -> Vec<&KState> {
        self.states
            .get(id)
            .map(|s| select(s).iter().filter_map(|&n| self.states.get(n)).collect())
            .unwrap_or_default()
    }
}
