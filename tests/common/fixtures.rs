#![allow(dead_code)]

use twoa_engine::adaptation::{NodeStats, TwoA};
use twoa_engine::constants::ELO_ADAPTER_TYPE;
use twoa_engine::ks::{KStructure, KsGenerator, PCategory};

pub const GAME: &str = "tileZero";

/// Elo pool with one player and scenarios spread over the rating scale.
pub fn seed_elo_pool(engine: &mut TwoA, player_id: &str, scenarios: &[(&str, f64)]) {
    assert!(engine.add_player_default(ELO_ADAPTER_TYPE, GAME, player_id));
    for (id, rating) in scenarios {
        let stats = NodeStats {
            rating: *rating,
            ..NodeStats::default()
        };
        assert!(engine.add_scenario(ELO_ADAPTER_TYPE, GAME, id, &stats, 900_000.0));
    }
}

pub fn default_scenarios() -> Vec<(&'static str, f64)> {
    vec![
        ("very easy", -3.0),
        ("easy", -1.5),
        ("medium", 0.0),
        ("hard", 1.5),
        ("very hard", 3.0),
    ]
}

pub fn categories(ratings: &[(&str, f64)]) -> Vec<PCategory> {
    ratings
        .iter()
        .map(|(id, rating)| PCategory::new(*id, *rating))
        .collect()
}

/// Seven categories whose rank order is `{a} {b,c} {d} {e,f} {g}` at a 0.4 threshold.
pub fn worked_example_categories() -> Vec<PCategory> {
    categories(&[
        ("a", 3.39),
        ("b", 24.18),
        ("c", 24.31),
        ("d", 32.19),
        ("e", 35.62),
        ("f", 37.05),
        ("g", 45.17),
    ])
}

pub fn expanded_worked_example() -> KStructure {
    let generator = KsGenerator::with_threshold(0.4).expect("threshold");
    let order = generator
        .create_rank_order_from_cats(&worked_example_categories())
        .expect("rank order");
    let mut ks = generator.create_kstructure(&order).expect("structure");
    generator
        .create_expanded_kstructure(&mut ks)
        .expect("expanded structure");
    ks
}
