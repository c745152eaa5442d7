//! Accuracy-only Elo model with fuzzy-interval scenario selection.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::adaptation::adapter::{AdapterError, DifficultyAdapter, RatingParams};
use crate::adaptation::misc;
use crate::adaptation::nodes::{PlayerNode, ScenarioNode};
use crate::constants::{
    DEF_EXPECT_SCORE_MAGNIFIER, DEF_MAGNIFIER_STEP_SIZE, DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT,
    ELO_ADAPTER_TYPE, FI_SD_MULTIPLIER, TARGET_DISTR_MEAN, TARGET_DISTR_SD, TARGET_LOWER_LIMIT,
    TARGET_UPPER_LIMIT,
};

const DESCRIPTION: &str = "Adapts game difficulty to player skill. Skill ratings are evaluated for individual players. Requires player accuracy (value within [0, 1]) observations. Uses the Elo equation for expected score estimation.";

/// Distribution of the desired success probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDistribution {
    pub mean: f64,
    pub sd: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

impl Default for TargetDistribution {
    fn default() -> Self {
        Self {
            mean: TARGET_DISTR_MEAN,
            sd: TARGET_DISTR_SD,
            lower_limit: TARGET_LOWER_LIMIT,
            upper_limit: TARGET_UPPER_LIMIT,
        }
    }
}

impl TargetDistribution {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.mean > 0.0 && self.mean < 1.0) {
            return Err(format!("mean must be in (0,1), got {}", self.mean));
        }
        if !(self.sd > 0.0 && self.sd < 1.0) {
            return Err(format!("sd must be in (0,1), got {}", self.sd));
        }
        if !(0.0..=1.0).contains(&self.lower_limit) || self.lower_limit >= self.mean {
            return Err(format!(
                "lower limit must be in [0,1] and below the mean, got {}",
                self.lower_limit
            ));
        }
        if !(0.0..=1.0).contains(&self.upper_limit) || self.upper_limit <= self.mean {
            return Err(format!(
                "upper limit must be in [0,1] and above the mean, got {}",
                self.upper_limit
            ));
        }
        Ok(())
    }
}

/// Four rating bounds around a player: `lower <= min <= max <= upper`.
/// `[min, max]` is the core band, `[lower, upper]` the support band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyInterval {
    pub lower: f64,
    pub min: f64,
    pub max: f64,
    pub upper: f64,
}

impl FuzzyInterval {
    fn in_core(&self, rating: f64) -> bool {
        rating >= self.min && rating <= self.max
    }

    fn in_support(&self, rating: f64) -> bool {
        rating >= self.lower && rating <= self.upper
    }

    fn core_distance(&self, rating: f64) -> f64 {
        (rating - self.min).abs().min((rating - self.max).abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EloAdapter {
    params: RatingParams,
    distribution: TargetDistribution,
    fi_sd_multiplier: f64,
    expect_score_magnifier: f64,
    magnifier_step_size: f64,
}

impl Default for EloAdapter {
    fn default() -> Self {
        Self {
            params: RatingParams::default(),
            distribution: TargetDistribution::default(),
            fi_sd_multiplier: FI_SD_MULTIPLIER,
            expect_score_magnifier: DEF_EXPECT_SCORE_MAGNIFIER,
            magnifier_step_size: DEF_MAGNIFIER_STEP_SIZE,
        }
    }
}

impl EloAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_distribution(&self) -> TargetDistribution {
        self.distribution
    }

    pub fn target_distr_mean(&self) -> f64 {
        self.distribution.mean
    }

    pub fn target_distr_sd(&self) -> f64 {
        self.distribution.sd
    }

    pub fn target_lower_limit(&self) -> f64 {
        self.distribution.lower_limit
    }

    pub fn target_upper_limit(&self) -> f64 {
        self.distribution.upper_limit
    }

    /// All four values are applied together or not at all.
    pub fn set_target_distribution(&mut self, mean: f64, sd: f64, lower: f64, upper: f64) -> bool {
        let candidate = TargetDistribution {
            mean,
            sd,
            lower_limit: lower,
            upper_limit: upper,
        };
        match candidate.validate() {
            Ok(()) => {
                self.distribution = candidate;
                true
            }
            Err(reason) => {
                tracing::warn!(%reason, "Target distribution unchanged");
                false
            }
        }
    }

    pub fn set_default_target_distribution(&mut self) {
        self.distribution = TargetDistribution::default();
    }

    pub fn fi_sd_multiplier(&self) -> f64 {
        self.fi_sd_multiplier
    }

    pub fn set_fi_sd_multiplier(&mut self, value: f64) {
        if value > 0.0 {
            self.fi_sd_multiplier = value;
        } else {
            tracing::warn!(value, "The standard deviation multiplier should be higher than 0");
        }
    }

    pub fn set_default_fi_sd_multiplier(&mut self) {
        self.fi_sd_multiplier = FI_SD_MULTIPLIER;
    }

    pub fn expect_score_magnifier(&self) -> f64 {
        self.expect_score_magnifier
    }

    pub fn set_expect_score_magnifier(&mut self, value: f64) {
        if value >= 0.0 {
            self.expect_score_magnifier = value;
        } else {
            tracing::warn!(value, "The expected score magnifier should be equal to or higher than 0");
        }
    }

    pub fn set_default_expect_score_magnifier(&mut self) {
        self.expect_score_magnifier = DEF_EXPECT_SCORE_MAGNIFIER;
    }

    pub fn magnifier_step_size(&self) -> f64 {
        self.magnifier_step_size
    }

    pub fn set_magnifier_step_size(&mut self, value: f64) {
        if value >= 1.0 {
            self.magnifier_step_size = value;
        } else {
            tracing::warn!(value, "The magnifier step size should be equal to or higher than 1");
        }
    }

    pub fn set_default_magnifier_step_size(&mut self) {
        self.magnifier_step_size = DEF_MAGNIFIER_STEP_SIZE;
    }

    /// `1 / (1 + magnifier^((beta - theta) / step))`
    pub fn calc_expected_score(&self, theta: f64, beta: f64) -> f64 {
        let exp_factor = self
            .expect_score_magnifier
            .powf((beta - theta) / self.magnifier_step_size);
        1.0 / (1.0 + exp_factor)
    }

    /// Samples the fuzzy interval of target ratings around `theta`.
    pub fn calc_target_betas(&self, theta: f64, rng: &mut dyn RngCore) -> FuzzyInterval {
        let distr = self.distribution;
        let spread = self.fi_sd_multiplier * distr.sd;
        let lower_distr_mean = (distr.mean - spread).max(DISTR_LOWER_LIMIT);
        let upper_distr_mean = (distr.mean + spread).min(DISTR_UPPER_LIMIT);

        // Core probabilities. The acceptance test admits every draw whenever
        // lower_limit < upper_limit.
        let mut core = [0.0_f64; 2];
        for slot in core.iter_mut() {
            *slot = loop {
                let draw = misc::normal(rng, distr.mean, distr.sd);
                if draw > distr.lower_limit || draw < distr.upper_limit {
                    break draw.clamp(DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT);
                }
            };
        }
        if core[0] > core[1] {
            core.swap(0, 1);
        }
        let [core_low, core_high] = core;

        let support_low = loop {
            let draw = misc::normal_one_side(rng, lower_distr_mean, distr.sd, true);
            if draw < core_low {
                break draw.max(DISTR_LOWER_LIMIT);
            }
        };
        let support_high = loop {
            let draw = misc::normal_one_side(rng, upper_distr_mean, distr.sd, false);
            if draw > core_high {
                break draw.min(DISTR_UPPER_LIMIT);
            }
        };

        // Higher success probability means an easier scenario, so the bounds flip.
        let to_rating = |p: f64| theta + ((1.0 - p) / p).ln();
        FuzzyInterval {
            lower: to_rating(support_high),
            min: to_rating(core_high),
            max: to_rating(core_low),
            upper: to_rating(support_low),
        }
    }

    /// Three-tier search. Core matches beat support matches which beat the
    /// closest out-of-band scenarios; ties inside a tier go to the least played
    /// and the final pick among equals is uniform.
    pub fn select_in_interval<'a>(
        interval: &FuzzyInterval,
        scenarios: &[&'a ScenarioNode],
        rng: &mut dyn RngCore,
    ) -> Option<&'a ScenarioNode> {
        let mut core: Vec<&'a ScenarioNode> = Vec::new();
        let mut support: Vec<&'a ScenarioNode> = Vec::new();
        let mut out: Vec<&'a ScenarioNode> = Vec::new();
        let mut out_min_distance = 0.0;

        for &scenario in scenarios {
            let rating = scenario.rating();
            let play_count = scenario.play_count();
            if interval.in_core(rating) {
                push_least_played(&mut core, scenario);
            } else if interval.in_support(rating) {
                push_least_played(&mut support, scenario);
            } else {
                let distance = interval.core_distance(rating);
                let out_min_play = out.first().map(|first| first.play_count());
                match out_min_play {
                    None => {
                        out.push(scenario);
                        out_min_distance = distance;
                    }
                    Some(_) if distance < out_min_distance => {
                        out.clear();
                        out.push(scenario);
                        out_min_distance = distance;
                    }
                    Some(min_play) if distance == out_min_distance => {
                        if play_count < min_play {
                            out.clear();
                            out.push(scenario);
                        } else if play_count == min_play {
                            out.push(scenario);
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        let tier = [core, support, out].into_iter().find(|t| !t.is_empty())?;
        let pick = misc::random_int(rng, 0, tier.len() - 1);
        tier.get(pick).copied()
    }
}

fn push_least_played<'a>(tier: &mut Vec<&'a ScenarioNode>, scenario: &'a ScenarioNode) {
    match tier.first().map(|first| first.play_count()) {
        Some(min) if scenario.play_count() > min => {}
        Some(min) if scenario.play_count() == min => tier.push(scenario),
        _ => {
            tier.clear();
            tier.push(scenario);
        }
    }
}

impl DifficultyAdapter for EloAdapter {
    fn adapter_type(&self) -> &'static str {
        ELO_ADAPTER_TYPE
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
        (0.0..=1.0).contains(&accuracy)
    }

    fn expected_score(&self, theta: f64, beta: f64, _time_limit: f64) -> Result<f64, AdapterError> {
        Ok(self.calc_expected_score(theta, beta))
    }

    /// Accuracy is the observed score; response time plays no role.
    fn actual_score(
        &self,
        accuracy: f64,
        _response_time: f64,
        _time_limit: f64,
    ) -> Result<f64, AdapterError> {
        if !self.validate_accuracy(accuracy) {
            return Err(AdapterError::InvalidAccuracy(accuracy));
        }
        Ok(accuracy)
    }

    fn target_difficulty_rating(&self, theta: f64) -> f64 {
        let mean = self.distribution.mean;
        theta + ((1.0 - mean) / mean).ln()
    }

    fn target_scenario<'a>(
        &self,
        player: &PlayerNode,
        scenarios: &[&'a ScenarioNode],
        rng: &mut dyn RngCore,
    ) -> Result<&'a ScenarioNode, AdapterError> {
        let empty = || AdapterError::EmptyScenarioList {
            adaptation_id: ELO_ADAPTER_TYPE.to_string(),
            game_id: player.game_id().to_string(),
        };
        if scenarios.is_empty() {
            tracing::error!(
                severity = "critical",
                adaptation_id = ELO_ADAPTER_TYPE,
                game_id = player.game_id(),
                "No scenarios found"
            );
            return Err(empty());
        }
        let interval = self.calc_target_betas(player.rating(), rng);
        tracing::debug!(
            player_id = player.player_id(),
            lower = interval.lower,
            min = interval.min,
            max = interval.max,
            upper = interval.upper,
            "Fuzzy interval computed"
        );
        Self::select_in_interval(&interval, scenarios, rng).ok_or_else(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::adapter::RatingUpdate;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario(id: &str, rating: f64, play_count: u32) -> ScenarioNode {
        let mut node = ScenarioNode::new(ELO_ADAPTER_TYPE, "g", id).unwrap();
        node.set_rating(rating);
        node.set_play_count(play_count);
        node
    }

    #[test]
    fn expected_score_is_half_for_equal_ratings() {
        let adapter = EloAdapter::new();
        assert!((adapter.calc_expected_score(3.0, 3.0) - 0.5).abs() < 1e-12);
        assert!(adapter.calc_expected_score(5.0, 1.0) > 0.5);
        assert!(adapter.calc_expected_score(1.0, 5.0) < 0.5);
    }

    #[test]
    fn target_difficulty_sits_below_theta() {
        let adapter = EloAdapter::new();
        let expected = 2.0 + (0.25_f64 / 0.75).ln();
        assert!((adapter.target_difficulty_rating(2.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn target_distribution_is_all_or_nothing() {
        let mut adapter = EloAdapter::new();
        assert!(!adapter.set_target_distribution(0.6, 0.2, 0.7, 0.9));
        assert_eq!(adapter.target_distribution(), TargetDistribution::default());
        assert!(!adapter.set_target_distribution(1.0, 0.1, 0.5, 1.0));
        assert!(adapter.set_target_distribution(0.6, 0.2, 0.3, 0.9));
        assert_eq!(adapter.target_distr_mean(), 0.6);
        assert_eq!(adapter.target_upper_limit(), 0.9);
        adapter.set_default_target_distribution();
        assert_eq!(adapter.target_distribution(), TargetDistribution::default());
    }

    #[test]
    fn tuning_setters_keep_old_values_on_invalid_input() {
        let mut adapter = EloAdapter::new();
        adapter.set_fi_sd_multiplier(0.0);
        adapter.set_expect_score_magnifier(-1.0);
        adapter.set_magnifier_step_size(0.5);
        assert_eq!(adapter, EloAdapter::new());

        adapter.set_magnifier_step_size(1.0);
        adapter.set_expect_score_magnifier(0.0);
        assert_eq!(adapter.magnifier_step_size(), 1.0);
        assert_eq!(adapter.expect_score_magnifier(), 0.0);
        adapter.set_default_magnifier_step_size();
        adapter.set_default_expect_score_magnifier();
        assert_eq!(adapter, EloAdapter::new());
    }

    #[test]
    fn fuzzy_interval_is_ordered() {
        let adapter = EloAdapter::new();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let fi = adapter.calc_target_betas(1.5, &mut rng);
            assert!(fi.lower <= fi.min, "{fi:?}");
            assert!(fi.min <= fi.max, "{fi:?}");
            assert!(fi.max <= fi.upper, "{fi:?}");
        }
    }

    #[test]
    fn core_tier_beats_support_and_out() {
        let interval = FuzzyInterval {
            lower: -2.0,
            min: -1.0,
            max: 1.0,
            upper: 2.0,
        };
        let core_busy = scenario("core-busy", 0.0, 9);
        let core_fresh = scenario("core-fresh", 0.5, 1);
        let support = scenario("support", 1.5, 0);
        let out = scenario("out", 10.0, 0);
        let mut rng = StdRng::seed_from_u64(5);
        let list = [&out, &support, &core_busy, &core_fresh];
        let picked = EloAdapter::select_in_interval(&interval, &list, &mut rng).unwrap();
        assert_eq!(picked.scenario_id(), "core-fresh");

        let list = [&out, &support];
        let picked = EloAdapter::select_in_interval(&interval, &list, &mut rng).unwrap();
        assert_eq!(picked.scenario_id(), "support");
    }

    #[test]
    fn out_tier_prefers_distance_then_play_count() {
        let interval = FuzzyInterval {
            lower: -2.0,
            min: -1.0,
            max: 1.0,
            upper: 2.0,
        };
        let far = scenario("far", 9.0, 0);
        let near_busy = scenario("near-busy", 4.0, 3);
        let near_fresh = scenario("near-fresh", -4.0, 1);
        let mut rng = StdRng::seed_from_u64(8);
        let list = [&far, &near_busy, &near_fresh];
        let picked = EloAdapter::select_in_interval(&interval, &list, &mut rng).unwrap();
        assert_eq!(picked.scenario_id(), "near-fresh");
    }

    #[test]
    fn empty_scenario_list_names_the_game() {
        let adapter = EloAdapter::new();
        let player = PlayerNode::new(ELO_ADAPTER_TYPE, "g", "p").unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            adapter.target_scenario(&player, &[], &mut rng),
            Err(AdapterError::EmptyScenarioList {
                adaptation_id: ELO_ADAPTER_TYPE.to_string(),
                game_id: "g".to_string(),
            })
        );
    }

    #[test]
    fn ties_are_picked_uniformly() {
        let interval = FuzzyInterval {
            lower: -2.0,
            min: -1.0,
            max: 1.0,
            upper: 2.0,
        };
        let a = scenario("a", 0.1, 0);
        let b = scenario("b", 0.2, 0);
        let mut rng = StdRng::seed_from_u64(13);
        let mut seen_a = false;
        let mut seen_b = false;
        for _ in 0..100 {
            match EloAdapter::select_in_interval(&interval, &[&a, &b], &mut rng)
                .unwrap()
                .scenario_id()
            {
                "a" => seen_a = true,
                _ => seen_b = true,
            }
        }
        assert!(seen_a && seen_b);
    }

    #[test]
    fn accuracy_equal_to_expectation_keeps_ratings() {
        let adapter = EloAdapter::new();
        let mut player = PlayerNode::new(ELO_ADAPTER_TYPE, "g", "p").unwrap();
        player.set_rating(1.2);
        let mut node = scenario("s", 0.4, 0);
        let expected = adapter.calc_expected_score(1.2, 0.4);
        let now = player.last_played() + Duration::days(2);

        let outcome = adapter
            .update_ratings(&mut player, &mut node, &RatingUpdate::new(0.0, expected), now)
            .unwrap();

        assert!((outcome.player_rating - 1.2).abs() < 1e-12);
        assert!((outcome.scenario_rating - 0.4).abs() < 1e-12);
        assert_eq!(player.play_count(), 1);
    }

    #[test]
    fn scenario_is_frozen_when_not_requested() {
        let adapter = EloAdapter::new();
        let mut player = PlayerNode::new(ELO_ADAPTER_TYPE, "g", "p").unwrap();
        let mut node = scenario("s", 0.4, 0);
        let before = node.clone();
        let update = RatingUpdate {
            update_scenario_rating: false,
            custom_player_k: Some(0.5),
            ..RatingUpdate::new(0.0, 1.0)
        };
        let now = player.last_played();
        let outcome = adapter
            .update_ratings(&mut player, &mut node, &update, now)
            .unwrap();
        assert_eq!(node, before);
        assert_eq!(player.k_factor(), 0.5);
        assert!(outcome.player_rating > 0.01);
    }

    #[test]
    fn out_of_range_accuracy_is_rejected() {
        let adapter = EloAdapter::new();
        let mut player = PlayerNode::new(ELO_ADAPTER_TYPE, "g", "p").unwrap();
        let mut node = scenario("s", 0.4, 0);
        let now = player.last_played();
        assert_eq!(
            adapter.update_ratings(&mut player, &mut node, &RatingUpdate::new(0.0, 1.2), now),
            Err(AdapterError::InvalidAccuracy(1.2))
        );
        assert_eq!(player.play_count(), 0);
    }
}
