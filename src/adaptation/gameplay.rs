use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptation::misc;

/// One logged attempt. Appended after every rating update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gameplay {
    adaptation_id: String,
    game_id: String,
    player_id: String,
    scenario_id: String,
    #[serde(with = "misc::timestamp")]
    timestamp: DateTime<Utc>,
    response_time: f64,
    accuracy: f64,
    player_rating: f64,
    scenario_rating: f64,
}

impl Gameplay {
    pub fn new(
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        if [adaptation_id, game_id, player_id, scenario_id]
            .iter()
            .any(|s| s.is_empty())
        {
            return None;
        }
        Some(Self {
            adaptation_id: adaptation_id.to_string(),
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            scenario_id: scenario_id.to_string(),
            timestamp,
            response_time: 0.0,
            accuracy: 0.0,
            player_rating: 0.0,
            scenario_rating: 0.0,
        })
    }

    pub fn with_outcome(
        mut self,
        response_time: f64,
        accuracy: f64,
        player_rating: f64,
        scenario_rating: f64,
    ) -> Self {
        self.response_time = response_time;
        self.accuracy = accuracy;
        self.player_rating = player_rating;
        self.scenario_rating = scenario_rating;
        self
    }

    pub fn adaptation_id(&self) -> &str {
        &self.adaptation_id
    }

    pub fn set_adaptation_id(&mut self, value: &str) -> bool {
        assign_non_empty(&mut self.adaptation_id, value)
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn set_game_id(&mut self, value: &str) -> bool {
        assign_non_empty(&mut self.game_id, value)
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn set_player_id(&mut self, value: &str) -> bool {
        assign_non_empty(&mut self.player_id, value)
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn set_scenario_id(&mut self, value: &str) -> bool {
        assign_non_empty(&mut self.scenario_id, value)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn response_time(&self) -> f64 {
        self.response_time
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn player_rating(&self) -> f64 {
        self.player_rating
    }

    pub fn scenario_rating(&self) -> f64 {
        self.scenario_rating
    }
}

fn assign_non_empty(slot: &mut String, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    *slot = value.to_string();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_are_ignored() {
        let mut record = Gameplay::new("adapt", "game", "p1", "s1", misc::default_timestamp())
            .expect("record");
        assert!(!record.set_player_id(""));
        assert_eq!(record.player_id(), "p1");
        assert!(record.set_scenario_id("s2"));
        assert_eq!(record.scenario_id(), "s2");
        assert!(Gameplay::new("adapt", "", "p1", "s1", misc::default_timestamp()).is_none());
    }
}
