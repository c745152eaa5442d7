use std::sync::Arc;

use crate::constants::{
    DEFAULT_KS_THRESHOLD, DEFAULT_SAME_PROBABILITY, MAX_SAME_PROBABILITY, MIN_SAME_PROBABILITY,
};
use crate::ks::category::{valid_threshold, CategoryRef, PCategory, Rank, RankOrder};
use crate::ks::state::{KState, KStructure, StateId, StateType};
use crate::ks::{state_id, KsError};

/// Builds rank orders from category ratings and knowledge structures from
/// rank orders.
#[derive(Debug, Clone, PartialEq)]
pub struct KsGenerator {
    threshold: f64,
    same_probability: f64,
}

impl Default for KsGenerator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_KS_THRESHOLD,
            same_probability: DEFAULT_SAME_PROBABILITY,
        }
    }
}

impl KsGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: f64) -> Result<Self, KsError> {
        let mut generator = Self::default();
        generator.set_threshold(threshold)?;
        Ok(generator)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), KsError> {
        if !valid_threshold(threshold) {
            return Err(KsError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }

    pub fn same_probability(&self) -> f64 {
        self.same_probability
    }

    /// Out-of-range values are logged and ignored.
    pub fn set_same_probability(&mut self, value: f64) -> bool {
        if !(MIN_SAME_PROBABILITY..=MAX_SAME_PROBABILITY).contains(&value) {
            tracing::warn!(value, "Same probability should be in [0, 1]");
            return false;
        }
        self.same_probability = value;
        true
    }

    /// Probability that a player rated `beta_two` solves a problem rated
    /// `beta_one`, compared against the same-difficulty probability.
    pub fn is_significantly_different(&self, beta_one: f64, beta_two: f64) -> bool {
        let observed = 1.0 / ((beta_one - beta_two).exp() + 1.0);
        (self.same_probability - observed).abs() >= self.threshold
    }

    /// Categories named "1", "2", ... in input order.
    pub fn create_rank_order(&self, ratings: &[f64]) -> Result<RankOrder, KsError> {
        let categories: Vec<PCategory> = ratings
            .iter()
            .enumerate()
            .map(|(i, &rating)| PCategory::new((i + 1).to_string(), rating))
            .collect();
        self.create_rank_order_from_cats(&categories)
    }

    /// Groups categories into ranks of statistically indistinguishable
    /// difficulty. A rank keeps growing while its first category is not
    /// significantly different from the next one.
    pub fn create_rank_order_from_cats(&self, categories: &[PCategory]) -> Result<RankOrder, KsError> {
        if categories.iter().any(|c| !c.has_id()) {
            tracing::error!("Cannot create a rank order; a category id is missing");
            return Err(KsError::MissingId);
        }

        let mut sorted: Vec<&PCategory> = categories.iter().collect();
        sorted.sort_by(|a, b| a.id().cmp(b.id()));

        let mut rated: Vec<(f64, CategoryRef)> = Vec::with_capacity(sorted.len());
        for (pos, category) in sorted.iter().enumerate() {
            let Some(rating) = category.rating() else {
                tracing::error!(id = category.id(), "Cannot create a rank order; rating is missing");
                return Err(KsError::MissingRating(category.id().to_string()));
            };
            if pos > 0 && sorted[pos - 1].is_same_category(category) {
                tracing::error!(id = category.id(), "Cannot create a rank order; duplicate category id");
                return Err(KsError::DuplicateId(category.id().to_string()));
            }
            rated.push((rating, Arc::new((*category).clone())));
        }
        rated.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut order = RankOrder::new();
        order.set_threshold(self.threshold);

        let mut current: Option<(f64, Rank)> = None;
        let mut rank_index = 0;
        for (rating, category) in rated {
            let starts_rank = match &current {
                None => true,
                Some((first_rating, _)) => self.is_significantly_different(*first_rating, rating),
            };
            if starts_rank {
                if let Some((_, rank)) = current.take() {
                    order.add_rank(rank, true);
                }
                rank_index += 1;
                current = Rank::new(rank_index).map(|rank| (rating, rank));
            }
            if let Some((_, rank)) = current.as_mut() {
                rank.add_category(category);
            }
        }
        if let Some((_, rank)) = current {
            order.add_rank(rank, true);
        }

        tracing::debug!(ranks = order.rank_count(), threshold = self.threshold, "Rank order created");
        Ok(order)
    }

    /// Rule 1: the union of any subset of a rank with all categories of the
    /// lower ranks is a knowledge state.
    pub fn create_kstructure(&self, rank_order: &RankOrder) -> Result<KStructure, KsError> {
        if rank_order.rank_count() == 0 {
            tracing::error!("Cannot create a knowledge structure; rank order has no ranks");
            return Err(KsError::EmptyRankOrder);
        }

        let mut order = rank_order.clone();
        order.sort_ascending();

        let mut candidates: Vec<KState> = Vec::new();
        let mut lower: Vec<CategoryRef> = Vec::new();
        for rank in order.ranks() {
            for subset in rank.subsets() {
                let mut state = KState::new(StateType::Core);
                for category in lower.iter().chain(subset.iter()) {
                    state.add_category(Arc::clone(category));
                }
                candidates.push(state);
            }
            lower.extend(rank.categories().iter().cloned());
        }
        candidates.sort_by_key(|s| s.category_count());

        let mut ks = KStructure::new(order);
        ks.add_rank(0);
        let mut rank_index: u32 = 0;
        let mut prev_rank: u32 = 0;
        let mut counter = 0;
        for state in candidates {
            if state.category_count() > rank_index as usize {
                counter = 0;
                prev_rank = rank_index;
                rank_index += 1;
                ks.add_rank(rank_index);
            }
            let Some(new_id) = ks.add_state(rank_index, state) else {
                continue;
            };
            counter += 1;
            if let Some(state) = ks.state_mut(new_id) {
                state.set_id(state_id(rank_index, counter));
            }
            link_to_rank(&mut ks, new_id, prev_rank, Direction::Prev);
        }

        tracing::debug!(
            ranks = ks.rank_count(),
            states = ks.state_count(),
            "Knowledge structure created"
        );
        Ok(ks)
    }

    /// Rule 2: the union of any subset of a rank with any state containing at
    /// least one category of the previous rank is a knowledge state. New states
    /// are added in place as `expanded`.
    pub fn create_expanded_kstructure(&self, ks: &mut KStructure) -> Result<(), KsError> {
        let Some(order) = ks.rank_order().filter(|o| o.rank_count() > 0).cloned() else {
            tracing::error!("Cannot expand the knowledge structure; rank order is missing");
            return Err(KsError::EmptyRankOrder);
        };
        if !ks.has_ranks() {
            tracing::error!("Cannot expand the knowledge structure; it has no ranks");
            return Err(KsError::NoRanks);
        }

        let before = ks.state_count();
        for pair in order.ranks().windows(2) {
            let (prev_rank, rank) = (&pair[0], &pair[1]);
            let min_index = prev_rank.index().unwrap_or(0);

            let states: Vec<StateId> = ks
                .ranks()
                .iter()
                .filter(|r| r.index() >= min_index)
                .flat_map(|r| r.states().iter().copied())
                .filter(|&s| {
                    ks.state(s).is_some_and(|state| {
                        state
                            .categories()
                            .iter()
                            .any(|c| prev_rank.category(c.id()).is_some())
                    })
                })
                .collect();
            if states.is_empty() {
                continue;
            }

            for subset in rank.subsets() {
                for &source in &states {
                    let Some(base) = ks.state(source) else {
                        continue;
                    };
                    let covered = base
                        .categories()
                        .iter()
                        .all(|c| subset.iter().any(|s| s.is_same_category(c)));
                    if covered {
                        continue;
                    }

                    let mut new_state = KState::new(StateType::Expanded);
                    for category in base.categories().iter().chain(subset.iter()) {
                        new_state.add_category(Arc::clone(category));
                    }
                    let size = new_state.category_count() as u32;
                    let Some(new_id) = ks.add_state(size, new_state) else {
                        continue;
                    };
                    let ordinal = ks.rank(size).map_or(0, |r| r.state_count());
                    if let Some(state) = ks.state_mut(new_id) {
                        state.set_id(state_id(size, ordinal));
                    }
                    link_to_rank(ks, new_id, size - 1, Direction::Prev);
                    link_to_rank(ks, new_id, size + 1, Direction::Next);
                }
            }
        }

        tracing::debug!(added = ks.state_count() - before, "Knowledge structure expanded");
        Ok(())
    }
}

enum Direction {
    Prev,
    Next,
}

/// Links `state` with every subset in rank `rank_index` (`Prev`) or every
/// superset there (`Next`).
fn link_to_rank(ks: &mut KStructure, state: StateId, rank_index: u32, direction: Direction) {
    let Some(neighbours) = ks.rank(rank_index).map(|r| r.states().to_vec()) else {
        return;
    };
    for other in neighbours {
        match direction {
            Direction::Prev if ks.is_subset(other, state) => ks.link(other, state),
            Direction::Next if ks.is_subset(state, other) => ks.link(state, other),
            _ => {}
        }
    }
}
