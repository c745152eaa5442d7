use std::sync::Arc;

use crate::constants::{MAX_KS_THRESHOLD, MIN_KS_THRESHOLD};

/// Categories are shared between a rank order and every structure built
/// from it.
pub type CategoryRef = Arc<PCategory>;

/// A problem category with its difficulty rating.
#[derive(Debug, Clone, PartialEq)]
pub struct PCategory {
    id: String,
    rating: Option<f64>,
}

impl PCategory {
    pub fn new(id: impl Into<String>, rating: f64) -> Self {
        Self {
            id: id.into(),
            rating: Some(rating),
        }
    }

    pub fn unrated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rating: None,
        }
    }

    pub fn shared(id: impl Into<String>, rating: f64) -> CategoryRef {
        Arc::new(Self::new(id, rating))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn set_rating(&mut self, rating: f64) {
        self.rating = Some(rating);
    }

    pub fn has_rating(&self) -> bool {
        self.rating.is_some()
    }

    pub fn is_same_id(&self, id: &str) -> bool {
        self.id == id
    }

    pub fn is_same_category(&self, other: &PCategory) -> bool {
        self.id == other.id
    }
}

/// Categories judged equally difficult. Indices start at 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rank {
    index: Option<u32>,
    categories: Vec<CategoryRef>,
}

impl Rank {
    /// `None` for index 0, which is reserved.
    pub fn new(index: u32) -> Option<Self> {
        if index == 0 {
            return None;
        }
        Some(Self {
            index: Some(index),
            categories: Vec::new(),
        })
    }

    pub fn unassigned() -> Self {
        Self::default()
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn set_index(&mut self, index: u32) -> bool {
        if index == 0 {
            return false;
        }
        self.index = Some(index);
        true
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn categories(&self) -> &[CategoryRef] {
        &self.categories
    }

    pub fn category_at(&self, pos: usize) -> Option<&CategoryRef> {
        self.categories.get(pos)
    }

    pub fn category(&self, id: &str) -> Option<&CategoryRef> {
        self.categories.iter().find(|c| c.is_same_id(id))
    }

    pub fn add_category(&mut self, category: CategoryRef) -> bool {
        if self.category(category.id()).is_some() {
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

    /// Removes this exact shared instance.
    pub fn remove_category(&mut self, category: &CategoryRef) -> bool {
        match self.categories.iter().position(|c| Arc::ptr_eq(c, category)) {
            Some(pos) => {
                self.categories.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn remove_category_at(&mut self, pos: usize) -> bool {
        if pos < self.categories.len() {
            self.categories.remove(pos);
            true
        } else {
            false
        }
    }

    /// Every non-empty subset in depth-first order: for `[a, b, c]` this is
    /// `[a] [a,b] [a,b,c] [a,c] [b] [b,c] [c]`.
    pub fn subsets(&self) -> Vec<Vec<CategoryRef>> {
        let mut out = Vec::new();
        let mut prefix = Vec::with_capacity(self.categories.len());
        collect_subsets(&self.categories, &mut prefix, &mut out);
        out
    }
}

fn collect_subsets(source: &[CategoryRef], prefix: &mut Vec<CategoryRef>, out: &mut Vec<Vec<CategoryRef>>) {
    for (i, category) in source.iter().enumerate() {
        prefix.push(Arc::clone(category));
        out.push(prefix.clone());
        collect_subsets(&source[i + 1..], prefix, out);
        prefix.pop();
    }
}

pub fn valid_threshold(threshold: f64) -> bool {
    (MIN_KS_THRESHOLD..MAX_KS_THRESHOLD).contains(&threshold)
}

/// Ranks of categories in ascending difficulty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankOrder {
    threshold: Option<f64>,
    ranks: Vec<Rank>,
}

impl RankOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the threshold is outside `[0, 1)`.
    pub fn with_threshold(threshold: f64) -> Option<Self> {
        let mut order = Self::new();
        order.set_threshold(threshold).then_some(order)
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) -> bool {
        if !valid_threshold(threshold) {
            tracing::warn!(threshold, "Rank order threshold must be in [0, 1)");
            return false;
        }
        self.threshold = Some(threshold);
        true
    }

    pub fn has_threshold(&self) -> bool {
        self.threshold.is_some()
    }

    pub fn rank_count(&self) -> usize {
        self.ranks.len()
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn rank_at(&self, pos: usize) -> Option<&Rank> {
        self.ranks.get(pos)
    }

    pub fn rank_at_mut(&mut self, pos: usize) -> Option<&mut Rank> {
        self.ranks.get_mut(pos)
    }

    pub fn add_rank(&mut self, rank: Rank, sort: bool) {
        self.ranks.push(rank);
        if sort {
            self.sort_ascending();
        }
    }

    pub fn remove_rank_at(&mut self, pos: usize, sort: bool) -> bool {
        if pos >= self.ranks.len() {
            return false;
        }
        self.ranks.remove(pos);
        if sort {
            self.sort_ascending();
        }
        true
    }

    /// Removes the rank carrying `index`.
    pub fn remove_rank(&mut self, index: u32, sort: bool) -> bool {
        match self.ranks.iter().position(|r| r.index() == Some(index)) {
            Some(pos) => self.remove_rank_at(pos, sort),
            None => false,
        }
    }

    /// Stable; unassigned indices sort first.
    pub fn sort_ascending(&mut self) {
        self.ranks.sort_by_key(|r| r.index());
    }

    /// All categories in rank order.
    pub fn categories(&self) -> Vec<CategoryRef> {
        self.ranks
            .iter()
            .flat_map(|r| r.categories().iter().cloned())
            .collect()
    }

    pub fn category(&self, id: &str) -> Option<&CategoryRef> {
        self.ranks.iter().find_map(|r| r.category(id))
    }
}
