//! Knowledge structures: rank orders of problem categories and the lattice of
//! knowledge states derived from them.

pub mod category;
pub mod generator;
pub mod state;
pub mod xml;

use thiserror::Error;

pub use category::{CategoryRef, PCategory, Rank, RankOrder};
pub use generator::KsGenerator;
pub use state::{KSRank, KState, KStructure, StateId, StateType};
pub use xml::XmlFactory;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KsError {
    #[error("category id is missing")]
    MissingId,
    #[error("rating for category '{0}' is missing")]
    MissingRating(String),
    #[error("duplicate category id: {0}")]
    DuplicateId(String),
    #[error("rank order has no ranks")]
    EmptyRankOrder,
    #[error("knowledge structure has no ranks")]
    NoRanks,
    #[error("invalid rank index: {0}")]
    InvalidRankIndex(i64),
    #[error("threshold must be in [0, 1), got {0}")]
    InvalidThreshold(f64),
    #[error("xml error: {0}")]
    Xml(String),
    #[error("missing xml element: {0}")]
    MissingElement(String),
    #[error("unknown reference: {0}")]
    UnknownReference(String),
}

/// `S{rank}.{ordinal}`
pub fn state_id(rank_index: u32, ordinal: usize) -> String {
    format!("S{rank_index}.{ordinal}")
}
