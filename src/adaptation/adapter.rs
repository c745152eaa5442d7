use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adaptation::misc;
use crate::adaptation::nodes::{PlayerNode, ScenarioNode};
use crate::constants::{DEF_K, DEF_K_DOWN, DEF_K_UP, DEF_MAX_DELAY, DEF_MAX_PLAY};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("response time must be positive, got {0}")]
    InvalidResponseTime(f64),
    #[error("item max duration must be positive, got {0}")]
    InvalidDuration(f64),
    #[error("invalid accuracy value: {0}")]
    InvalidAccuracy(f64),
    #[error("empty scenario list for adaptation {adaptation_id} in game {game_id}")]
    EmptyScenarioList {
        adaptation_id: String,
        game_id: String,
    },
    #[error("rating update produced a non-finite value: expected={expected_score}, player={player_rating}, scenario={scenario_rating}")]
    NonFiniteRating {
        expected_score: f64,
        player_rating: f64,
        scenario_rating: f64,
    },
}

impl AdapterError {
    /// Calling-contract violations abort the caller; everything else is
    /// reported and swallowed.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            AdapterError::InvalidAccuracy(_) | AdapterError::NonFiniteRating { .. }
        )
    }
}

/// Uncertainty and K-factor tuning shared by both adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingParams {
    max_delay: f64,
    max_play: f64,
    k_const: f64,
    k_up: f64,
    k_down: f64,
}

impl Default for RatingParams {
    fn default() -> Self {
        Self {
            max_delay: DEF_MAX_DELAY,
            max_play: DEF_MAX_PLAY,
            k_const: DEF_K,
            k_up: DEF_K_UP,
            k_down: DEF_K_DOWN,
        }
    }
}

impl RatingParams {
    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    pub fn set_max_delay(&mut self, value: f64) {
        if value > 0.0 {
            self.max_delay = value;
        } else {
            tracing::warn!(value, "The maximum number of delay days should be higher than 0");
        }
    }

    pub fn set_default_max_delay(&mut self) {
        self.max_delay = DEF_MAX_DELAY;
    }

    pub fn max_play(&self) -> f64 {
        self.max_play
    }

    pub fn set_max_play(&mut self, value: f64) {
        if value > 0.0 {
            self.max_play = value;
        } else {
            tracing::warn!(value, "The maximum administration parameter should be higher than 0");
        }
    }

    pub fn set_default_max_play(&mut self) {
        self.max_play = DEF_MAX_PLAY;
    }

    pub fn k_const(&self) -> f64 {
        self.k_const
    }

    pub fn set_k_const(&mut self, value: f64) {
        if value > 0.0 {
            self.k_const = value;
        } else {
            tracing::warn!(value, "K constant should be a positive number");
        }
    }

    pub fn set_default_k_const(&mut self) {
        self.k_const = DEF_K;
    }

    pub fn k_up(&self) -> f64 {
        self.k_up
    }

    pub fn set_k_up(&mut self, value: f64) {
        if value >= 0.0 {
            self.k_up = value;
        } else {
            tracing::warn!(value, "The upward uncertainty weight cannot be a negative number");
        }
    }

    pub fn set_default_k_up(&mut self) {
        self.k_up = DEF_K_UP;
    }

    pub fn k_down(&self) -> f64 {
        self.k_down
    }

    pub fn set_k_down(&mut self, value: f64) {
        if value >= 0.0 {
            self.k_down = value;
        } else {
            tracing::warn!(value, "The downward uncertainty weight cannot be a negative number");
        }
    }

    pub fn set_default_k_down(&mut self) {
        self.k_down = DEF_K_DOWN;
    }

    /// Elapsed days since the last play, capped at `max_delay`.
    pub fn capped_delay(&self, last_played: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        misc::days_elapsed(last_played, now).min(self.max_delay)
    }

    /// `u - 1/maxPlay + delay/maxDelay`, clamped into [0, 1].
    pub fn calc_uncertainty(&self, current: f64, delay_days: f64) -> f64 {
        let delay = delay_days.min(self.max_delay);
        (current - 1.0 / self.max_play + delay / self.max_delay).clamp(0.0, 1.0)
    }

    pub fn calc_theta_k_factor(&self, theta_u: f64, beta_u: f64) -> f64 {
        self.k_const * (1.0 + self.k_up * theta_u - self.k_down * beta_u)
    }

    pub fn calc_beta_k_factor(&self, theta_u: f64, beta_u: f64) -> f64 {
        self.k_const * (1.0 + self.k_up * beta_u - self.k_down * theta_u)
    }
}

pub fn calc_theta(theta: f64, k_factor: f64, actual: f64, expected: f64) -> f64 {
    theta + k_factor * (actual - expected)
}

/// The scenario moves opposite to the player.
pub fn calc_beta(beta: f64, k_factor: f64, actual: f64, expected: f64) -> f64 {
    beta + k_factor * (expected - actual)
}

/// One observed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingUpdate {
    pub response_time: f64,
    pub accuracy: f64,
    pub update_scenario_rating: bool,
    pub custom_player_k: Option<f64>,
    pub custom_scenario_k: Option<f64>,
}

impl RatingUpdate {
    pub fn new(response_time: f64, accuracy: f64) -> Self {
        Self {
            response_time,
            accuracy,
            update_scenario_rating: true,
            custom_player_k: None,
            custom_scenario_k: None,
        }
    }
}

/// Values computed by a rating update, used for the gameplay log.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingOutcome {
    pub expected_score: f64,
    pub actual_score: f64,
    pub player_rating: f64,
    pub scenario_rating: f64,
    pub player_k_factor: f64,
    pub scenario_k_factor: f64,
    pub player_uncertainty: f64,
    pub scenario_uncertainty: f64,
}

/// A rating algorithm selected by its adaptation id.
pub trait DifficultyAdapter {
    fn adapter_type(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn params(&self) -> &RatingParams;

    fn params_mut(&mut self) -> &mut RatingParams;

    fn validate_accuracy(&self, accuracy: f64) -> bool;

    fn expected_score(&self, theta: f64, beta: f64, time_limit: f64) -> Result<f64, AdapterError>;

    fn actual_score(
        &self,
        accuracy: f64,
        response_time: f64,
        time_limit: f64,
    ) -> Result<f64, AdapterError>;

    /// Rating of the ideal scenario for a player rated `theta`.
    fn target_difficulty_rating(&self, theta: f64) -> f64;

    fn target_scenario<'a>(
        &self,
        player: &PlayerNode,
        scenarios: &[&'a ScenarioNode],
        rng: &mut dyn RngCore,
    ) -> Result<&'a ScenarioNode, AdapterError>;

    /// Computes the new ratings and writes them back. Nothing is written
    /// when validation fails.
    fn update_ratings(
        &self,
        player: &mut PlayerNode,
        scenario: &mut ScenarioNode,
        update: &RatingUpdate,
        now: DateTime<Utc>,
    ) -> Result<RatingOutcome, AdapterError> {
        if !self.validate_accuracy(update.accuracy) {
            return Err(AdapterError::InvalidAccuracy(update.accuracy));
        }
        let params = self.params();

        let actual_score =
            self.actual_score(update.accuracy, update.response_time, scenario.time_limit())?;
        let expected_score =
            self.expected_score(player.rating(), scenario.rating(), scenario.time_limit())?;

        let player_delay = params.capped_delay(player.last_played(), now);
        let scenario_delay = params.capped_delay(scenario.last_played(), now);
        let player_uncertainty = params.calc_uncertainty(player.uncertainty(), player_delay);
        let scenario_uncertainty = params.calc_uncertainty(scenario.uncertainty(), scenario_delay);

        let player_k_factor = match update.custom_player_k {
            Some(k) if k > 0.0 => k,
            _ => params.calc_theta_k_factor(player_uncertainty, scenario_uncertainty),
        };
        let scenario_k_factor = match update.custom_scenario_k {
            Some(k) if k > 0.0 => k,
            _ => params.calc_beta_k_factor(player_uncertainty, scenario_uncertainty),
        };

        let player_rating = calc_theta(player.rating(), player_k_factor, actual_score, expected_score);
        let scenario_rating =
            calc_beta(scenario.rating(), scenario_k_factor, actual_score, expected_score);
        if !(expected_score.is_finite() && player_rating.is_finite() && scenario_rating.is_finite()) {
            tracing::warn!(
                player_id = player.player_id(),
                scenario_id = scenario.scenario_id(),
                expected_score,
                player_rating,
                scenario_rating,
                "Rating update skipped; computed values are not finite"
            );
            return Err(AdapterError::NonFiniteRating {
                expected_score,
                player_rating,
                scenario_rating,
            });
        }

        player.set_rating(player_rating);
        player.set_play_count(player.play_count().saturating_add(1));
        player.set_k_factor(player_k_factor);
        player.set_uncertainty(player_uncertainty);
        player.set_last_played(now);

        if update.update_scenario_rating {
            scenario.set_rating(scenario_rating);
            scenario.set_play_count(scenario.play_count().saturating_add(1));
            scenario.set_k_factor(scenario_k_factor);
            scenario.set_uncertainty(scenario_uncertainty);
            scenario.set_last_played(now);
        }

        Ok(RatingOutcome {
            expected_score,
            actual_score,
            player_rating,
            scenario_rating,
            player_k_factor,
            scenario_k_factor,
            player_uncertainty,
            scenario_uncertainty,
        })
    }
}
