use serde::{Deserialize, Serialize};

use crate::adaptation::adapter::RatingParams;
use crate::adaptation::elo::TargetDistribution;
use crate::constants::{
    DEF_EXPECT_SCORE_MAGNIFIER, DEF_K, DEF_K_DOWN, DEF_K_UP, DEF_MAGNIFIER_STEP_SIZE,
    DEF_MAX_DELAY, DEF_MAX_PLAY, FI_SD_MULTIPLIER,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingConfig {
    pub max_delay: f64,
    pub max_play: f64,
    pub k_const: f64,
    pub k_up: f64,
    pub k_down: f64,
}

impl Default for RatingConfig {
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

impl RatingConfig {
    fn validate(&self, scope: &str) -> Result<(), String> {
        if self.max_delay <= 0.0 {
            return Err(format!("{scope}.maxDelay must be > 0"));
        }
        if self.max_play <= 0.0 {
            return Err(format!("{scope}.maxPlay must be > 0"));
        }
        if self.k_const <= 0.0 {
            return Err(format!("{scope}.kConst must be > 0"));
        }
        if self.k_up < 0.0 {
            return Err(format!("{scope}.kUp must be >= 0"));
        }
        if self.k_down < 0.0 {
            return Err(format!("{scope}.kDown must be >= 0"));
        }
        Ok(())
    }

    /// Pushes the values through the parameter setters.
    pub fn apply(&self, params: &mut RatingParams) {
        params.set_max_delay(self.max_delay);
        params.set_max_play(self.max_play);
        params.set_k_const(self.k_const);
        params.set_k_up(self.k_up);
        params.set_k_down(self.k_down);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloConfig {
    #[serde(flatten)]
    pub rating: RatingConfig,
    #[serde(default = "default_fi_sd_multiplier")]
    pub fi_sd_multiplier: f64,
    #[serde(default = "default_expect_score_magnifier")]
    pub expect_score_magnifier: f64,
    #[serde(default = "default_magnifier_step_size")]
    pub magnifier_step_size: f64,
    #[serde(default)]
    pub target_distribution: TargetDistribution,
}

fn default_fi_sd_multiplier() -> f64 {
    FI_SD_MULTIPLIER
}

fn default_expect_score_magnifier() -> f64 {
    DEF_EXPECT_SCORE_MAGNIFIER
}

fn default_magnifier_step_size() -> f64 {
    DEF_MAGNIFIER_STEP_SIZE
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            rating: RatingConfig::default(),
            fi_sd_multiplier: FI_SD_MULTIPLIER,
            expect_score_magnifier: DEF_EXPECT_SCORE_MAGNIFIER,
            magnifier_step_size: DEF_MAGNIFIER_STEP_SIZE,
            target_distribution: TargetDistribution::default(),
        }
    }
}

/// Tuning document for both adapters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub response_time: RatingConfig,
    #[serde(default)]
    pub elo: EloConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.response_time.validate("responseTime")?;
        self.elo.rating.validate("elo")?;
        if self.elo.fi_sd_multiplier <= 0.0 {
            return Err("elo.fiSdMultiplier must be > 0".to_string());
        }
        if self.elo.expect_score_magnifier < 0.0 {
            return Err("elo.expectScoreMagnifier must be >= 0".to_string());
        }
        if self.elo.magnifier_step_size < 1.0 {
            return Err("elo.magnifierStepSize must be >= 1".to_string());
        }
        self.elo
            .target_distribution
            .validate()
            .map_err(|e| format!("elo.targetDistribution: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = EngineConfig::default();
        cfg.elo.magnifier_step_size = 0.5;
        assert!(cfg.validate().unwrap_err().contains("magnifierStepSize"));

        let mut cfg = EngineConfig::default();
        cfg.response_time.k_const = 0.0;
        assert!(cfg.validate().unwrap_err().contains("responseTime.kConst"));

        let mut cfg = EngineConfig::default();
        cfg.elo.target_distribution.lower_limit = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"elo":{"maxDelay":10,"maxPlay":20,"kConst":0.01,"kUp":4,"kDown":0.5}}"#)
                .unwrap();
        assert_eq!(cfg.elo.rating.max_delay, 10.0);
        assert_eq!(cfg.elo.magnifier_step_size, DEF_MAGNIFIER_STEP_SIZE);
        assert_eq!(cfg.response_time, RatingConfig::default());
    }
}
