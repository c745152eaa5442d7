use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptation::misc;
use crate::constants::{DEFAULT_TIME_LIMIT, INITIAL_K_FCT, INITIAL_RATING, INITIAL_UNCERTAINTY};

/// Rating state shared by players and scenarios, used when a node is
/// created with explicit values.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStats {
    pub rating: f64,
    pub play_count: u32,
    pub k_factor: f64,
    pub uncertainty: f64,
    pub last_played: DateTime<Utc>,
}

impl Default for NodeStats {
    fn default() -> Self {
        Self {
            rating: INITIAL_RATING,
            play_count: 0,
            k_factor: INITIAL_K_FCT,
            uncertainty: INITIAL_UNCERTAINTY,
            last_played: misc::default_timestamp(),
        }
    }
}

/// Accessors and guarded setters for the rating fields. Setters return
/// `false` and keep the previous value when the argument is out of range.
macro_rules! rating_attributes {
    ($node:ty) => {
        impl $node {
            pub fn adaptation_id(&self) -> &str {
                &self.adaptation_id
            }

            pub fn game_id(&self) -> &str {
                &self.game_id
            }

            pub fn rating(&self) -> f64 {
                self.rating
            }

            pub fn set_rating(&mut self, value: f64) -> bool {
                if !value.is_finite() {
                    return false;
                }
                self.rating = value;
                true
            }

            pub fn play_count(&self) -> u32 {
                self.play_count
            }

            pub fn set_play_count(&mut self, value: u32) -> bool {
                self.play_count = value;
                true
            }

            pub fn k_factor(&self) -> f64 {
                self.k_factor
            }

            pub fn set_k_factor(&mut self, value: f64) -> bool {
                if value <= 0.0 || !value.is_finite() {
                    return false;
                }
                self.k_factor = value;
                true
            }

            pub fn uncertainty(&self) -> f64 {
                self.uncertainty
            }

            pub fn set_uncertainty(&mut self, value: f64) -> bool {
                if !(0.0..=1.0).contains(&value) {
                    return false;
                }
                self.uncertainty = value;
                true
            }

            pub fn last_played(&self) -> DateTime<Utc> {
                self.last_played
            }

            pub fn set_last_played(&mut self, value: DateTime<Utc>) {
                self.last_played = value;
            }

            /// Applies every field of `stats`, failing on the first rejected value.
            fn apply_stats(&mut self, stats: &NodeStats) -> bool {
                self.set_rating(stats.rating)
                    && self.set_play_count(stats.play_count)
                    && self.set_k_factor(stats.k_factor)
                    && self.set_uncertainty(stats.uncertainty)
                    && {
                        self.set_last_played(stats.last_played);
                        true
                    }
            }

            fn stats_are_valid(&self) -> bool {
                self.rating.is_finite()
                    && self.k_factor > 0.0
                    && (0.0..=1.0).contains(&self.uncertainty)
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNode {
    adaptation_id: String,
    game_id: String,
    player_id: String,
    rating: f64,
    play_count: u32,
    k_factor: f64,
    uncertainty: f64,
    #[serde(with = "misc::timestamp")]
    last_played: DateTime<Utc>,
}

rating_attributes!(PlayerNode);

impl PlayerNode {
    /// New player with initial ratings. Returns `None` when any id is empty.
    pub fn new(adaptation_id: &str, game_id: &str, player_id: &str) -> Option<Self> {
        if adaptation_id.is_empty() || game_id.is_empty() || player_id.is_empty() {
            return None;
        }
        let defaults = NodeStats::default();
        Some(Self {
            adaptation_id: adaptation_id.to_string(),
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            rating: defaults.rating,
            play_count: defaults.play_count,
            k_factor: defaults.k_factor,
            uncertainty: defaults.uncertainty,
            last_played: defaults.last_played,
        })
    }

    pub fn with_stats(
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        stats: &NodeStats,
    ) -> Option<Self> {
        let mut node = Self::new(adaptation_id, game_id, player_id)?;
        node.apply_stats(stats).then_some(node)
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn matches(&self, adaptation_id: &str, game_id: &str, player_id: &str) -> bool {
        self.adaptation_id == adaptation_id && self.game_id == game_id && self.player_id == player_id
    }

    /// Nodes read from a document bypass the setters and are checked here.
    pub fn is_valid(&self) -> bool {
        !self.adaptation_id.is_empty()
            && !self.game_id.is_empty()
            && !self.player_id.is_empty()
            && self.stats_are_valid()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioNode {
    adaptation_id: String,
    game_id: String,
    scenario_id: String,
    rating: f64,
    play_count: u32,
    k_factor: f64,
    uncertainty: f64,
    #[serde(with = "misc::timestamp")]
    last_played: DateTime<Utc>,
    time_limit: f64,
}

rating_attributes!(ScenarioNode);

impl ScenarioNode {
    pub fn new(adaptation_id: &str, game_id: &str, scenario_id: &str) -> Option<Self> {
        if adaptation_id.is_empty() || game_id.is_empty() || scenario_id.is_empty() {
            return None;
        }
        let defaults = NodeStats::default();
        Some(Self {
            adaptation_id: adaptation_id.to_string(),
            game_id: game_id.to_string(),
            scenario_id: scenario_id.to_string(),
            rating: defaults.rating,
            play_count: defaults.play_count,
            k_factor: defaults.k_factor,
            uncertainty: defaults.uncertainty,
            last_played: defaults.last_played,
            time_limit: DEFAULT_TIME_LIMIT,
        })
    }

    pub fn with_stats(
        adaptation_id: &str,
        game_id: &str,
        scenario_id: &str,
        stats: &NodeStats,
        time_limit: f64,
    ) -> Option<Self> {
        let mut node = Self::new(adaptation_id, game_id, scenario_id)?;
        (node.apply_stats(stats) && node.set_time_limit(time_limit)).then_some(node)
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    pub fn set_time_limit(&mut self, value: f64) -> bool {
        if value <= 0.0 || !value.is_finite() {
            return false;
        }
        self.time_limit = value;
        true
    }

    pub fn matches(&self, adaptation_id: &str, game_id: &str, scenario_id: &str) -> bool {
        self.adaptation_id == adaptation_id
            && self.game_id == game_id
            && self.scenario_id == scenario_id
    }

    pub fn is_valid(&self) -> bool {
        !self.adaptation_id.is_empty()
            && !self.game_id.is_empty()
            && !self.scenario_id.is_empty()
            && self.time_limit > 0.0
            && self.stats_are_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ELO_ADAPTER_TYPE;

    #[test]
    fn new_nodes_carry_initial_values() {
        let player = PlayerNode::new(ELO_ADAPTER_TYPE, "game", "p1").expect("player");
        assert_eq!(player.rating(), INITIAL_RATING);
        assert_eq!(player.play_count(), 0);
        assert_eq!(player.k_factor(), INITIAL_K_FCT);
        assert_eq!(player.uncertainty(), INITIAL_UNCERTAINTY);
        assert_eq!(misc::format_timestamp(&player.last_played()), "2015-07-22T11:56:17");

        let scenario = ScenarioNode::new(ELO_ADAPTER_TYPE, "game", "s1").expect("scenario");
        assert_eq!(scenario.time_limit(), DEFAULT_TIME_LIMIT);
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert!(PlayerNode::new("", "game", "p1").is_none());
        assert!(PlayerNode::new(ELO_ADAPTER_TYPE, "", "p1").is_none());
        assert!(ScenarioNode::new(ELO_ADAPTER_TYPE, "game", "").is_none());
    }

    #[test]
    fn invalid_setter_values_keep_previous() {
        let mut scenario = ScenarioNode::new(ELO_ADAPTER_TYPE, "game", "s1").expect("scenario");
        assert!(!scenario.set_k_factor(0.0));
        assert!(!scenario.set_k_factor(-1.0));
        assert!(!scenario.set_uncertainty(1.5));
        assert!(!scenario.set_uncertainty(-0.1));
        assert!(!scenario.set_time_limit(0.0));
        assert!(!scenario.set_rating(f64::NAN));
        assert_eq!(scenario.k_factor(), INITIAL_K_FCT);
        assert_eq!(scenario.uncertainty(), INITIAL_UNCERTAINTY);
        assert_eq!(scenario.time_limit(), DEFAULT_TIME_LIMIT);
        assert_eq!(scenario.rating(), INITIAL_RATING);

        assert!(scenario.set_uncertainty(0.0));
        assert!(scenario.set_k_factor(0.5));
        assert_eq!(scenario.uncertainty(), 0.0);
        assert_eq!(scenario.k_factor(), 0.5);
    }

    #[test]
    fn with_stats_rejects_any_invalid_field() {
        let stats = NodeStats {
            uncertainty: 2.0,
            ..NodeStats::default()
        };
        assert!(PlayerNode::with_stats(ELO_ADAPTER_TYPE, "game", "p1", &stats).is_none());
        assert!(ScenarioNode::with_stats(
            ELO_ADAPTER_TYPE,
            "game",
            "s1",
            &NodeStats::default(),
            -5.0
        )
        .is_none());
    }

    #[test]
    fn serializes_with_camel_case_and_timestamp_layout() {
        let player = PlayerNode::new(ELO_ADAPTER_TYPE, "game", "p1").expect("player");
        let value = serde_json::to_value(&player).expect("to value");
        assert_eq!(value["playerId"], "p1");
        assert_eq!(value["lastPlayed"], "2015-07-22T11:56:17");
        let back: PlayerNode = serde_json::from_value(value).expect("from value");
        assert_eq!(back, player);
    }
}
