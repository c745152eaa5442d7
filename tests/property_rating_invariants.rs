use chrono::Utc;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use twoa_engine::adaptation::{
    DifficultyAdapter, EloAdapter, PlayerNode, RatingParams, RatingUpdate, ResponseTimeAdapter,
    ScenarioNode,
};
use twoa_engine::constants::ELO_ADAPTER_TYPE;

proptest! {
    #[test]
    fn pt_elo_expected_score_in_open_unit_interval(theta in -10.0_f64..10.0, beta in -10.0_f64..10.0) {
        let score = EloAdapter::new().calc_expected_score(theta, beta);
        prop_assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn pt_elo_expected_score_grows_with_skill(theta in -10.0_f64..10.0, gap in 0.0_f64..5.0, beta in -10.0_f64..10.0) {
        let adapter = EloAdapter::new();
        prop_assert!(adapter.calc_expected_score(theta + gap, beta) >= adapter.calc_expected_score(theta, beta));
    }

    #[test]
    fn pt_elo_equal_ratings_give_even_odds(rating in -50.0_f64..50.0) {
        let score = EloAdapter::new().calc_expected_score(rating, rating);
        prop_assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pt_rt_expected_score_monotone(
        theta in -5.0_f64..5.0,
        beta in -5.0_f64..5.0,
        gap in 0.01_f64..3.0,
        time_limit in 1_000.0_f64..900_000.0,
    ) {
        // zero difference is substituted inside the score, keep clear of it
        prop_assume!((theta - beta).abs() >= 0.01);
        prop_assume!((theta + gap - beta).abs() >= 0.01);
        prop_assume!((theta - beta - gap).abs() >= 0.01);

        let base = ResponseTimeAdapter::calc_expected_score(theta, beta, time_limit).unwrap();
        let stronger = ResponseTimeAdapter::calc_expected_score(theta + gap, beta, time_limit).unwrap();
        let harder = ResponseTimeAdapter::calc_expected_score(theta, beta + gap, time_limit).unwrap();
        prop_assert!(base.is_finite());
        prop_assert!(stronger >= base, "stronger player {stronger} < {base}");
        prop_assert!(harder <= base, "harder scenario {harder} > {base}");
    }

    #[test]
    fn pt_rt_actual_score_is_symmetric_and_bounded(rt in 1.0_f64..90_000.0, extra in 0.0_f64..10_000.0) {
        let duration = rt + extra;
        let right = ResponseTimeAdapter::calc_actual_score(1.0, rt, duration).unwrap();
        let wrong = ResponseTimeAdapter::calc_actual_score(0.0, rt, duration).unwrap();
        prop_assert!((right + wrong).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&right));
    }

    #[test]
    fn pt_uncertainty_stays_in_unit_interval(current in -5.0_f64..5.0, delay in -100.0_f64..1_000.0) {
        let u = RatingParams::default().calc_uncertainty(current, delay);
        prop_assert!((0.0..=1.0).contains(&u));
    }

    #[test]
    fn pt_rt_target_beta_is_easier_than_player(theta in -5.0_f64..5.0, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        // success probability above one half puts the target above theta on the logit scale
        let beta = ResponseTimeAdapter::calc_target_beta(theta, &mut rng);
        prop_assert!(beta > theta);
    }

    #[test]
    fn pt_elo_matching_accuracy_keeps_ratings(theta in -3.0_f64..3.0, beta in -3.0_f64..3.0) {
        let adapter = EloAdapter::new();
        let mut player = PlayerNode::new(ELO_ADAPTER_TYPE, "g", "p").unwrap();
        let mut scenario = ScenarioNode::new(ELO_ADAPTER_TYPE, "g", "s").unwrap();
        prop_assert!(player.set_rating(theta));
        prop_assert!(scenario.set_rating(beta));

        let accuracy = adapter.calc_expected_score(theta, beta);
        let outcome = adapter
            .update_ratings(&mut player, &mut scenario, &RatingUpdate::new(1_000.0, accuracy), Utc::now())
            .unwrap();
        prop_assert_eq!(outcome.player_rating, theta);
        prop_assert_eq!(outcome.scenario_rating, beta);
        prop_assert_eq!(player.play_count(), 1);
    }
}
