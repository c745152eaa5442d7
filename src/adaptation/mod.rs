//! Player and scenario ratings, the two difficulty adapters and the
//! orchestrator that dispatches between them.

pub mod adapter;
pub mod config;
pub mod elo;
pub mod engine;
pub mod gameplay;
pub mod misc;
pub mod nodes;
pub mod response_time;

pub use adapter::{AdapterError, DifficultyAdapter, RatingOutcome, RatingParams, RatingUpdate};
pub use config::EngineConfig;
pub use elo::{EloAdapter, FuzzyInterval, TargetDistribution};
pub use engine::{AttrValue, EngineError, NodeAttribute, TwoA};
pub use gameplay::Gameplay;
pub use nodes::{NodeStats, PlayerNode, ScenarioNode};
pub use response_time::ResponseTimeAdapter;
