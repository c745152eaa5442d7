//! Response-time weighted model: scores depend on both correctness and how
//! quickly the player answered relative to the scenario's time limit.

use rand::RngCore;

use crate::adaptation::adapter::{AdapterError, DifficultyAdapter, RatingParams};
use crate::adaptation::misc;
use crate::adaptation::nodes::{PlayerNode, ScenarioNode};
use crate::constants::{
    RT_ADAPTER_TYPE, TARGET_DISTR_MEAN, TARGET_DISTR_SD, TARGET_LOWER_LIMIT, TARGET_UPPER_LIMIT,
};

const DESCRIPTION: &str = "Adapts game difficulty to player skill. Skill ratings are evaluated for individual players. Requires player accuracy (0 or 1) and response time. Uses a modified version of the CAP algorithm.";

/// Rating difference substituted for an exact tie to keep the expected score finite.
const MIN_RATING_DIFFERENCE: f64 = 0.001;

#[derive(Debug, Clone, Default)]
pub struct ResponseTimeAdapter {
    params: RatingParams,
}

impl ResponseTimeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn discrimination(item_max_duration: f64) -> f64 {
        1.0 / item_max_duration
    }

    fn validate_response_time(response_time: f64) -> Result<(), AdapterError> {
        if response_time <= 0.0 || response_time.is_nan() {
            tracing::error!(severity = "critical", response_time, "Response time must be positive");
            return Err(AdapterError::InvalidResponseTime(response_time));
        }
        Ok(())
    }

    fn validate_item_max_duration(item_max_duration: f64) -> Result<(), AdapterError> {
        if item_max_duration <= 0.0 || item_max_duration.is_nan() {
            tracing::error!(
                severity = "critical",
                item_max_duration,
                "Item max duration must be positive"
            );
            return Err(AdapterError::InvalidDuration(item_max_duration));
        }
        Ok(())
    }

    /// `(2c - 1) * a * (d - rt)` with discrimination `a = 1/d`.
    pub fn calc_actual_score(
        correct_answer: f64,
        response_time: f64,
        item_max_duration: f64,
    ) -> Result<f64, AdapterError> {
        Self::validate_response_time(response_time)?;
        Self::validate_item_max_duration(item_max_duration)?;
        let discrimination = Self::discrimination(item_max_duration);
        Ok((2.0 * correct_answer - 1.0)
            * (discrimination * item_max_duration - discrimination * response_time))
    }

    pub fn calc_expected_score(
        theta: f64,
        beta: f64,
        item_max_duration: f64,
    ) -> Result<f64, AdapterError> {
        Self::validate_item_max_duration(item_max_duration)?;
        let weight = Self::discrimination(item_max_duration) * item_max_duration;
        let mut difference = theta - beta;
        if difference == 0.0 {
            difference = MIN_RATING_DIFFERENCE;
        }
        let exp_factor = (2.0 * weight * difference).exp();
        Ok(weight * ((exp_factor + 1.0) / (exp_factor - 1.0)) - 1.0 / difference)
    }

    /// Draws a success probability from the truncated target distribution and
    /// maps it onto the rating scale.
    pub fn calc_target_beta(theta: f64, rng: &mut dyn RngCore) -> f64 {
        let p = loop {
            let draw = misc::normal(rng, TARGET_DISTR_MEAN, TARGET_DISTR_SD);
            if draw > TARGET_LOWER_LIMIT && draw < TARGET_UPPER_LIMIT && draw != 0.0 && draw != 1.0
            {
                break draw;
            }
        };
        theta + (p / (1.0 - p)).ln()
    }
}

impl DifficultyAdapter for ResponseTimeAdapter {
    fn adapter_type(&self) -> &'static str {
        RT_ADAPTER_TYPE
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn params(&self) -> &RatingParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut RatingParams {
        &mut self.params
    }

    fn validate_accuracy(&self, accuracy: f64) -> bool {
        accuracy == 0.0 || accuracy == 1.0
    }

    fn expected_score(&self, theta: f64, beta: f64, time_limit: f64) -> Result<f64, AdapterError> {
        Self::calc_expected_score(theta, beta, time_limit)
    }

    fn actual_score(
        &self,
        accuracy: f64,
        response_time: f64,
        time_limit: f64,
    ) -> Result<f64, AdapterError> {
        Self::calc_actual_score(accuracy, response_time, time_limit)
    }

    fn target_difficulty_rating(&self, theta: f64) -> f64 {
        theta + (TARGET_DISTR_MEAN / (1.0 - TARGET_DISTR_MEAN)).ln()
    }

    /// Closest rating to a sampled target; ties go to the less played scenario.
    fn target_scenario<'a>(
        &self,
        player: &PlayerNode,
        scenarios: &[&'a ScenarioNode],
        rng: &mut dyn RngCore,
    ) -> Result<&'a ScenarioNode, AdapterError> {
        if scenarios.is_empty() {
            tracing::error!(
                severity = "critical",
                adaptation_id = RT_ADAPTER_TYPE,
                game_id = player.game_id(),
                "No scenarios found"
            );
            return Err(AdapterError::EmptyScenarioList {
                adaptation_id: RT_ADAPTER_TYPE.to_string(),
                game_id: player.game_id().to_string(),
            });
        }

        let target = Self::calc_target_beta(player.rating(), rng);
        let mut best: Option<(&'a ScenarioNode, f64)> = None;
        for &scenario in scenarios {
            let distance = (scenario.rating() - target).abs();
            best = match best {
                None => Some((scenario, distance)),
                Some((current, min_distance)) => {
                    if distance < min_distance
                        || (distance == min_distance && scenario.play_count() < current.play_count())
                    {
                        Some((scenario, distance))
                    } else {
                        Some((current, min_distance))
                    }
                }
            };
        }

        best.map(|(scenario, _)| scenario)
            .ok_or_else(|| AdapterError::EmptyScenarioList {
                adaptation_id: RT_ADAPTER_TYPE.to_string(),
                game_id: player.game_id().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::adapter::RatingUpdate;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn actual_score_is_symmetric_in_correctness() {
        let right = ResponseTimeAdapter::calc_actual_score(1.0, 30_000.0, 90_000.0).unwrap();
        let wrong = ResponseTimeAdapter::calc_actual_score(0.0, 30_000.0, 90_000.0).unwrap();
        assert!((right + wrong).abs() < 1e-12);
        assert!((right - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_time_values_are_rejected() {
        assert_eq!(
            ResponseTimeAdapter::calc_actual_score(1.0, 0.0, 90_000.0),
            Err(AdapterError::InvalidResponseTime(0.0))
        );
        assert_eq!(
            ResponseTimeAdapter::calc_actual_score(1.0, 10.0, -1.0),
            Err(AdapterError::InvalidDuration(-1.0))
        );
        assert!(ResponseTimeAdapter::calc_expected_score(0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn expected_score_handles_equal_ratings() {
        let score = ResponseTimeAdapter::calc_expected_score(1.0, 1.0, 90_000.0).unwrap();
        assert!(score.is_finite());
        assert!(score.abs() < 0.01);
    }

    #[test]
    fn expected_score_grows_with_skill() {
        let low = ResponseTimeAdapter::calc_expected_score(-1.0, 0.0, 1000.0).unwrap();
        let high = ResponseTimeAdapter::calc_expected_score(1.0, 0.0, 1000.0).unwrap();
        assert!(high > low);
    }

    #[test]
    fn target_beta_lies_inside_logit_band() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let beta = ResponseTimeAdapter::calc_target_beta(0.0, &mut rng);
            assert!(beta.is_finite());
            assert!(beta > 0.0, "beta {beta} below the p=0.5 logit");
            assert!(beta < (0.9999f64 / 0.0001).ln(), "beta {beta} beyond the p=0.9999 logit");
        }
    }

    #[test]
    fn picks_closest_then_least_played() {
        let adapter = ResponseTimeAdapter::new();
        let player = PlayerNode::new(RT_ADAPTER_TYPE, "g", "p").unwrap();
        let mut near = ScenarioNode::new(RT_ADAPTER_TYPE, "g", "near").unwrap();
        near.set_rating(1.1);
        let mut far = ScenarioNode::new(RT_ADAPTER_TYPE, "g", "far").unwrap();
        far.set_rating(50.0);
        let mut rng = StdRng::seed_from_u64(1);
        let picked = adapter.target_scenario(&player, &[&far, &near], &mut rng).unwrap();
        assert_eq!(picked.scenario_id(), "near");

        let mut twin = near.clone();
        near.set_play_count(5);
        twin.set_play_count(2);
        let picked = adapter.target_scenario(&player, &[&near, &twin], &mut rng).unwrap();
        assert_eq!(picked.play_count(), 2);
    }

    #[test]
    fn empty_scenario_list_is_an_error() {
        let adapter = ResponseTimeAdapter::new();
        let player = PlayerNode::new(RT_ADAPTER_TYPE, "g", "p").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            adapter.target_scenario(&player, &[], &mut rng),
            Err(AdapterError::EmptyScenarioList { .. })
        ));
    }

    #[test]
    fn update_moves_both_ratings_and_caps_delay() {
        let adapter = ResponseTimeAdapter::new();
        let mut player = PlayerNode::new(RT_ADAPTER_TYPE, "g", "p").unwrap();
        let mut scenario = ScenarioNode::new(RT_ADAPTER_TYPE, "g", "s").unwrap();
        let now = player.last_played() + Duration::days(400);

        let outcome = adapter
            .update_ratings(&mut player, &mut scenario, &RatingUpdate::new(10_000.0, 1.0), now)
            .unwrap();

        assert!(outcome.player_rating > 0.01);
        assert!(outcome.scenario_rating < 0.01);
        assert_eq!(player.play_count(), 1);
        assert_eq!(scenario.play_count(), 1);
        assert_eq!(player.uncertainty(), 1.0);
        assert_eq!(player.last_played(), now);
    }

    #[test]
    fn non_binary_accuracy_leaves_nodes_untouched() {
        let adapter = ResponseTimeAdapter::new();
        let mut player = PlayerNode::new(RT_ADAPTER_TYPE, "g", "p").unwrap();
        let mut scenario = ScenarioNode::new(RT_ADAPTER_TYPE, "g", "s").unwrap();
        let before = player.clone();
        let now = player.last_played();
        let err = adapter
            .update_ratings(&mut player, &mut scenario, &RatingUpdate::new(1000.0, 0.5), now)
            .unwrap_err();
        assert_eq!(err, AdapterError::InvalidAccuracy(0.5));
        assert_eq!(player, before);
    }

    #[test]
    fn overflowing_expected_score_leaves_nodes_untouched() {
        let adapter = ResponseTimeAdapter::new();
        let mut player = PlayerNode::new(RT_ADAPTER_TYPE, "g", "p").unwrap();
        player.set_rating(400.0);
        let mut scenario = ScenarioNode::new(RT_ADAPTER_TYPE, "g", "s").unwrap();
        assert!(scenario.set_time_limit(900_000.0));
        let player_before = player.clone();
        let scenario_before = scenario.clone();
        let now = player.last_played() + Duration::days(1);

        let err = adapter
            .update_ratings(&mut player, &mut scenario, &RatingUpdate::new(1000.0, 1.0), now)
            .unwrap_err();

        assert!(matches!(err, AdapterError::NonFiniteRating { .. }));
        assert!(!err.is_contract_violation());
        assert_eq!(player, player_before);
        assert_eq!(scenario, scenario_before);
    }
}
