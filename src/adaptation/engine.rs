use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adaptation::adapter::{AdapterError, DifficultyAdapter, RatingParams, RatingUpdate};
use crate::adaptation::config::EngineConfig;
use crate::adaptation::elo::{EloAdapter, TargetDistribution};
use crate::adaptation::gameplay::Gameplay;
use crate::adaptation::misc;
use crate::adaptation::nodes::{NodeStats, PlayerNode, ScenarioNode};
use crate::adaptation::response_time::ResponseTimeAdapter;
use crate::constants::{ELO_ADAPTER_TYPE, RT_ADAPTER_TYPE};
use crate::store::{self, keys, DataStorage, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("player not found: adaptation={adaptation_id}, game={game_id}, player={player_id}")]
    PlayerNotFound {
        adaptation_id: String,
        game_id: String,
        player_id: String,
    },
    #[error("scenario not found: adaptation={adaptation_id}, game={game_id}, scenario={scenario_id}")]
    ScenarioNotFound {
        adaptation_id: String,
        game_id: String,
        scenario_id: String,
    },
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Rating attributes addressable through the generic accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAttribute {
    Rating,
    PlayCount,
    KFactor,
    Uncertainty,
    LastPlayed,
    TimeLimit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue {
    Rating(f64),
    PlayCount(u32),
    KFactor(f64),
    Uncertainty(f64),
    LastPlayed(DateTime<Utc>),
    TimeLimit(f64),
}

impl AttrValue {
    pub fn attribute(&self) -> NodeAttribute {
        match self {
            AttrValue::Rating(_) => NodeAttribute::Rating,
            AttrValue::PlayCount(_) => NodeAttribute::PlayCount,
            AttrValue::KFactor(_) => NodeAttribute::KFactor,
            AttrValue::Uncertainty(_) => NodeAttribute::Uncertainty,
            AttrValue::LastPlayed(_) => NodeAttribute::LastPlayed,
            AttrValue::TimeLimit(_) => NodeAttribute::TimeLimit,
        }
    }

    /// Numeric view; timestamps and counts are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AttrValue::Rating(v)
            | AttrValue::KFactor(v)
            | AttrValue::Uncertainty(v)
            | AttrValue::TimeLimit(v) => Some(v),
            AttrValue::PlayCount(v) => Some(f64::from(v)),
            AttrValue::LastPlayed(_) => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdaptationDocument {
    #[serde(default)]
    players: Vec<PlayerNode>,
    #[serde(default)]
    scenarios: Vec<ScenarioNode>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameplayDocument {
    #[serde(default)]
    gameplays: Vec<Gameplay>,
}

fn select_adapter<'a>(
    rt: &'a ResponseTimeAdapter,
    elo: &'a EloAdapter,
    adaptation_id: &str,
) -> Option<&'a dyn DifficultyAdapter> {
    match adaptation_id {
        RT_ADAPTER_TYPE => Some(rt),
        ELO_ADAPTER_TYPE => Some(elo),
        _ => {
            tracing::error!(adaptation_id, "Unknown adaptation id");
            None
        }
    }
}

fn player_index(players: &[PlayerNode], adaptation_id: &str, game_id: &str, player_id: &str) -> Option<usize> {
    players
        .iter()
        .position(|p| p.matches(adaptation_id, game_id, player_id))
}

fn scenario_index(
    scenarios: &[ScenarioNode],
    adaptation_id: &str,
    game_id: &str,
    scenario_id: &str,
) -> Option<usize> {
    scenarios
        .iter()
        .position(|s| s.matches(adaptation_id, game_id, scenario_id))
}

/// Orchestrator owning players, scenarios, the gameplay log and both adapters.
pub struct TwoA {
    players: Vec<PlayerNode>,
    scenarios: Vec<ScenarioNode>,
    gameplays: Vec<Gameplay>,
    rt_adapter: ResponseTimeAdapter,
    elo_adapter: EloAdapter,
    rng: StdRng,
    storage: Option<Box<dyn DataStorage>>,
}

impl Default for TwoA {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoA {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic sampling, for reproducible runs and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            players: Vec::new(),
            scenarios: Vec::new(),
            gameplays: Vec::new(),
            rt_adapter: ResponseTimeAdapter::new(),
            elo_adapter: EloAdapter::new(),
            rng,
            storage: None,
        }
    }

    pub fn with_storage(mut self, storage: Box<dyn DataStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn attach_storage(&mut self, storage: Box<dyn DataStorage>) {
        self.storage = Some(storage);
    }

    pub fn apply_config(&mut self, config: &EngineConfig) -> Result<(), String> {
        config.validate()?;
        config.response_time.apply(self.rt_adapter.params_mut());
        config.elo.rating.apply(self.elo_adapter.params_mut());
        self.elo_adapter.set_fi_sd_multiplier(config.elo.fi_sd_multiplier);
        self.elo_adapter
            .set_expect_score_magnifier(config.elo.expect_score_magnifier);
        self.elo_adapter
            .set_magnifier_step_size(config.elo.magnifier_step_size);
        let distr = config.elo.target_distribution;
        self.elo_adapter.set_target_distribution(
            distr.mean,
            distr.sd,
            distr.lower_limit,
            distr.upper_limit,
        );
        tracing::info!("Adapter configuration applied");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // adapters

    pub fn adapter(&self, adaptation_id: &str) -> Option<&dyn DifficultyAdapter> {
        select_adapter(&self.rt_adapter, &self.elo_adapter, adaptation_id)
    }

    pub fn adapter_description(&self, adaptation_id: &str) -> Option<&'static str> {
        self.adapter(adaptation_id).map(|a| a.description())
    }

    pub fn rating_params(&self, adaptation_id: &str) -> Option<&RatingParams> {
        self.adapter(adaptation_id).map(|a| a.params())
    }

    /// Uncertainty and K-factor tuning of the selected adapter. Invalid values
    /// passed to the returned setters are logged and ignored.
    pub fn rating_params_mut(&mut self, adaptation_id: &str) -> Option<&mut RatingParams> {
        match adaptation_id {
            RT_ADAPTER_TYPE => Some(self.rt_adapter.params_mut()),
            ELO_ADAPTER_TYPE => Some(self.elo_adapter.params_mut()),
            _ => {
                tracing::error!(adaptation_id, "Unknown adaptation id");
                None
            }
        }
    }

    /// Elo-only tuning (fuzzy interval, magnifier, target distribution).
    pub fn elo_adapter(&self, adaptation_id: &str) -> Option<&EloAdapter> {
        if adaptation_id == ELO_ADAPTER_TYPE {
            Some(&self.elo_adapter)
        } else {
            tracing::error!(adaptation_id, "Adaptation has no Elo parameters");
            None
        }
    }

    pub fn elo_adapter_mut(&mut self, adaptation_id: &str) -> Option<&mut EloAdapter> {
        if adaptation_id == ELO_ADAPTER_TYPE {
            Some(&mut self.elo_adapter)
        } else {
            tracing::error!(adaptation_id, "Adaptation has no Elo parameters");
            None
        }
    }

    // ---------------------------------------------------------------------
    // players and scenarios

    pub fn add_player_default(&mut self, adaptation_id: &str, game_id: &str, player_id: &str) -> bool {
        self.add_player(adaptation_id, game_id, player_id, &NodeStats::default())
    }

    /// Fails when the adaptation is unknown, a value is invalid or the
    /// identity triple is already taken.
    pub fn add_player(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        stats: &NodeStats,
    ) -> bool {
        if self.adapter(adaptation_id).is_none() {
            return false;
        }
        if player_index(&self.players, adaptation_id, game_id, player_id).is_some() {
            tracing::error!(adaptation_id, game_id, player_id, "Player already exists");
            return false;
        }
        match PlayerNode::with_stats(adaptation_id, game_id, player_id, stats) {
            Some(node) => {
                self.players.push(node);
                true
            }
            None => {
                tracing::error!(adaptation_id, game_id, player_id, "Invalid player values");
                false
            }
        }
    }

    pub fn add_scenario_default(&mut self, adaptation_id: &str, game_id: &str, scenario_id: &str) -> bool {
        self.add_scenario(
            adaptation_id,
            game_id,
            scenario_id,
            &NodeStats::default(),
            crate::constants::DEFAULT_TIME_LIMIT,
        )
    }

    pub fn add_scenario(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        scenario_id: &str,
        stats: &NodeStats,
        time_limit: f64,
    ) -> bool {
        if self.adapter(adaptation_id).is_none() {
            return false;
        }
        if scenario_index(&self.scenarios, adaptation_id, game_id, scenario_id).is_some() {
            tracing::error!(adaptation_id, game_id, scenario_id, "Scenario already exists");
            return false;
        }
        match ScenarioNode::with_stats(adaptation_id, game_id, scenario_id, stats, time_limit) {
            Some(node) => {
                self.scenarios.push(node);
                true
            }
            None => {
                tracing::error!(adaptation_id, game_id, scenario_id, "Invalid scenario values");
                false
            }
        }
    }

    pub fn remove_player(&mut self, adaptation_id: &str, game_id: &str, player_id: &str) -> bool {
        match player_index(&self.players, adaptation_id, game_id, player_id) {
            Some(idx) => {
                self.players.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn remove_scenario(&mut self, adaptation_id: &str, game_id: &str, scenario_id: &str) -> bool {
        match scenario_index(&self.scenarios, adaptation_id, game_id, scenario_id) {
            Some(idx) => {
                self.scenarios.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn player(&self, adaptation_id: &str, game_id: &str, player_id: &str) -> Option<&PlayerNode> {
        player_index(&self.players, adaptation_id, game_id, player_id).map(|i| &self.players[i])
    }

    pub fn player_mut(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
    ) -> Option<&mut PlayerNode> {
        player_index(&self.players, adaptation_id, game_id, player_id)
            .map(move |i| &mut self.players[i])
    }

    pub fn scenario(&self, adaptation_id: &str, game_id: &str, scenario_id: &str) -> Option<&ScenarioNode> {
        scenario_index(&self.scenarios, adaptation_id, game_id, scenario_id).map(|i| &self.scenarios[i])
    }

    pub fn scenario_mut(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        scenario_id: &str,
    ) -> Option<&mut ScenarioNode> {
        scenario_index(&self.scenarios, adaptation_id, game_id, scenario_id)
            .map(move |i| &mut self.scenarios[i])
    }

    pub fn all_players(&self, adaptation_id: &str, game_id: &str) -> Vec<&PlayerNode> {
        self.players
            .iter()
            .filter(|p| p.adaptation_id() == adaptation_id && p.game_id() == game_id)
            .collect()
    }

    pub fn all_scenarios(&self, adaptation_id: &str, game_id: &str) -> Vec<&ScenarioNode> {
        self.scenarios
            .iter()
            .filter(|s| s.adaptation_id() == adaptation_id && s.game_id() == game_id)
            .collect()
    }

    pub fn players(&self) -> &[PlayerNode] {
        &self.players
    }

    pub fn scenarios(&self) -> &[ScenarioNode] {
        &self.scenarios
    }

    pub fn gameplays(&self) -> &[Gameplay] {
        &self.gameplays
    }

    // ---------------------------------------------------------------------
    // attribute access

    /// Required-field accessor: a missing player or attribute is an error.
    pub fn player_param(
        &self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        attribute: NodeAttribute,
    ) -> Result<AttrValue, EngineError> {
        let not_found = || EngineError::PlayerNotFound {
            adaptation_id: adaptation_id.to_string(),
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
        };
        let Some(node) = self.player(adaptation_id, game_id, player_id) else {
            tracing::error!(severity = "critical", adaptation_id, game_id, player_id, ?attribute, "Unable to get player parameter");
            return Err(not_found());
        };
        let value = match attribute {
            NodeAttribute::Rating => AttrValue::Rating(node.rating()),
            NodeAttribute::PlayCount => AttrValue::PlayCount(node.play_count()),
            NodeAttribute::KFactor => AttrValue::KFactor(node.k_factor()),
            NodeAttribute::Uncertainty => AttrValue::Uncertainty(node.uncertainty()),
            NodeAttribute::LastPlayed => AttrValue::LastPlayed(node.last_played()),
            NodeAttribute::TimeLimit => {
                tracing::error!(severity = "critical", player_id, "Players have no time limit");
                return Err(not_found());
            }
        };
        Ok(value)
    }

    pub fn scenario_param(
        &self,
        adaptation_id: &str,
        game_id: &str,
        scenario_id: &str,
        attribute: NodeAttribute,
    ) -> Result<AttrValue, EngineError> {
        let Some(node) = self.scenario(adaptation_id, game_id, scenario_id) else {
            tracing::error!(severity = "critical", adaptation_id, game_id, scenario_id, ?attribute, "Unable to get scenario parameter");
            return Err(EngineError::ScenarioNotFound {
                adaptation_id: adaptation_id.to_string(),
                game_id: game_id.to_string(),
                scenario_id: scenario_id.to_string(),
            });
        };
        Ok(match attribute {
            NodeAttribute::Rating => AttrValue::Rating(node.rating()),
            NodeAttribute::PlayCount => AttrValue::PlayCount(node.play_count()),
            NodeAttribute::KFactor => AttrValue::KFactor(node.k_factor()),
            NodeAttribute::Uncertainty => AttrValue::Uncertainty(node.uncertainty()),
            NodeAttribute::LastPlayed => AttrValue::LastPlayed(node.last_played()),
            NodeAttribute::TimeLimit => AttrValue::TimeLimit(node.time_limit()),
        })
    }

    /// Lenient getter: logs and returns `None` instead of failing.
    pub fn get_player_attr(
        &self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        attribute: NodeAttribute,
    ) -> Option<AttrValue> {
        self.player_param(adaptation_id, game_id, player_id, attribute).ok()
    }

    pub fn get_scenario_attr(
        &self,
        adaptation_id: &str,
        game_id: &str,
        scenario_id: &str,
        attribute: NodeAttribute,
    ) -> Option<AttrValue> {
        self.scenario_param(adaptation_id, game_id, scenario_id, attribute)
            .ok()
    }

    /// Returns `false` when the player is missing or the value is rejected.
    pub fn set_player_attr(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        value: AttrValue,
    ) -> bool {
        let Some(node) = self.player_mut(adaptation_id, game_id, player_id) else {
            tracing::error!(adaptation_id, game_id, player_id, "Unable to set player attribute; player not found");
            return false;
        };
        let accepted = match value {
            AttrValue::Rating(v) => node.set_rating(v),
            AttrValue::PlayCount(v) => node.set_play_count(v),
            AttrValue::KFactor(v) => node.set_k_factor(v),
            AttrValue::Uncertainty(v) => node.set_uncertainty(v),
            AttrValue::LastPlayed(v) => {
                node.set_last_played(v);
                true
            }
            AttrValue::TimeLimit(_) => false,
        };
        if !accepted {
            tracing::error!(player_id, ?value, "Invalid player attribute value");
        }
        accepted
    }

    pub fn set_scenario_attr(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        scenario_id: &str,
        value: AttrValue,
    ) -> bool {
        let Some(node) = self.scenario_mut(adaptation_id, game_id, scenario_id) else {
            tracing::error!(adaptation_id, game_id, scenario_id, "Unable to set scenario attribute; scenario not found");
            return false;
        };
        let accepted = match value {
            AttrValue::Rating(v) => node.set_rating(v),
            AttrValue::PlayCount(v) => node.set_play_count(v),
            AttrValue::KFactor(v) => node.set_k_factor(v),
            AttrValue::Uncertainty(v) => node.set_uncertainty(v),
            AttrValue::LastPlayed(v) => {
                node.set_last_played(v);
                true
            }
            AttrValue::TimeLimit(v) => node.set_time_limit(v),
        };
        if !accepted {
            tracing::error!(scenario_id, ?value, "Invalid scenario attribute value");
        }
        accepted
    }

    // ---------------------------------------------------------------------
    // recommendation

    pub fn target_scenario_id(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
    ) -> Result<Option<String>, EngineError> {
        Ok(self
            .target_scenario(adaptation_id, game_id, player_id)?
            .map(|s| s.scenario_id().to_string()))
    }

    /// Recommends a scenario of `game_id` for the player. Unknown adaptations
    /// and players give `Ok(None)`; an empty scenario pool is an error.
    pub fn target_scenario(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
    ) -> Result<Option<ScenarioNode>, EngineError> {
        let Some(adapter) = select_adapter(&self.rt_adapter, &self.elo_adapter, adaptation_id) else {
            return Ok(None);
        };
        let Some(p_idx) = player_index(&self.players, adaptation_id, game_id, player_id) else {
            tracing::error!(adaptation_id, game_id, player_id, "Unable to recommend a scenario; player not found");
            return Ok(None);
        };
        let candidates: Vec<&ScenarioNode> = self
            .scenarios
            .iter()
            .filter(|s| s.adaptation_id() == adaptation_id && s.game_id() == game_id)
            .collect();
        let picked = adapter.target_scenario(&self.players[p_idx], &candidates, &mut self.rng)?;
        Ok(Some(picked.clone()))
    }

    /// Like [`TwoA::target_scenario`] with a one-off target distribution; the
    /// stored adapter keeps its own. Only the Elo adaptation supports this.
    pub fn target_scenario_custom(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        distribution: TargetDistribution,
    ) -> Result<Option<ScenarioNode>, EngineError> {
        let Some(adapter) = self.custom_elo(adaptation_id, distribution) else {
            return Ok(None);
        };
        let Some(p_idx) = player_index(&self.players, adaptation_id, game_id, player_id) else {
            tracing::error!(adaptation_id, game_id, player_id, "Unable to recommend a scenario; player not found");
            return Ok(None);
        };
        let candidates: Vec<&ScenarioNode> = self
            .scenarios
            .iter()
            .filter(|s| s.adaptation_id() == adaptation_id && s.game_id() == game_id)
            .collect();
        let picked = adapter.target_scenario(&self.players[p_idx], &candidates, &mut self.rng)?;
        Ok(Some(picked.clone()))
    }

    pub fn target_difficulty_rating(
        &self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
    ) -> Option<f64> {
        let adapter = self.adapter(adaptation_id)?;
        let Some(player) = self.player(adaptation_id, game_id, player_id) else {
            tracing::error!(adaptation_id, game_id, player_id, "Unable to compute target rating; player not found");
            return None;
        };
        Some(adapter.target_difficulty_rating(player.rating()))
    }

    pub fn target_difficulty_rating_custom(
        &self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        distribution: TargetDistribution,
    ) -> Option<f64> {
        let adapter = self.custom_elo(adaptation_id, distribution)?;
        let Some(player) = self.player(adaptation_id, game_id, player_id) else {
            tracing::error!(adaptation_id, game_id, player_id, "Unable to compute target rating; player not found");
            return None;
        };
        Some(adapter.target_difficulty_rating(player.rating()))
    }

    fn custom_elo(&self, adaptation_id: &str, distribution: TargetDistribution) -> Option<EloAdapter> {
        let mut adapter = self.elo_adapter(adaptation_id)?.clone();
        if !adapter.set_target_distribution(
            distribution.mean,
            distribution.sd,
            distribution.lower_limit,
            distribution.upper_limit,
        ) {
            tracing::error!(?distribution, "Invalid custom target distribution");
            return None;
        }
        Some(adapter)
    }

    // ---------------------------------------------------------------------
    // rating updates

    /// Updates the player (and optionally the scenario) after one attempt and
    /// appends a gameplay record. Tier-two failures (unknown adaptation,
    /// missing node, invalid accuracy) are logged and give `Ok(false)`.
    pub fn update_ratings(
        &mut self,
        adaptation_id: &str,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        update: &RatingUpdate,
        update_datafiles: bool,
    ) -> Result<bool, EngineError> {
        let Some(adapter) = select_adapter(&self.rt_adapter, &self.elo_adapter, adaptation_id) else {
            return Ok(false);
        };
        let Some(p_idx) = player_index(&self.players, adaptation_id, game_id, player_id) else {
            tracing::error!(adaptation_id, game_id, player_id, "Unable to update ratings; player not found");
            return Ok(false);
        };
        let Some(s_idx) = scenario_index(&self.scenarios, adaptation_id, game_id, scenario_id) else {
            tracing::error!(adaptation_id, game_id, scenario_id, "Unable to update ratings; scenario not found");
            return Ok(false);
        };

        let now = misc::now_truncated();
        let outcome = match adapter.update_ratings(
            &mut self.players[p_idx],
            &mut self.scenarios[s_idx],
            update,
            now,
        ) {
            Ok(outcome) => outcome,
            Err(e) if !e.is_contract_violation() => {
                tracing::error!(error = %e, player_id, scenario_id, "Unable to update ratings");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        match Gameplay::new(adaptation_id, game_id, player_id, scenario_id, now) {
            Some(record) => self.gameplays.push(record.with_outcome(
                update.response_time,
                update.accuracy,
                outcome.player_rating,
                outcome.scenario_rating,
            )),
            None => tracing::error!(player_id, scenario_id, "Unable to log a gameplay record"),
        }

        tracing::debug!(
            adaptation_id,
            player_id,
            scenario_id,
            expected = outcome.expected_score,
            actual = outcome.actual_score,
            player_rating = outcome.player_rating,
            scenario_rating = outcome.scenario_rating,
            "Ratings updated"
        );

        if update_datafiles {
            self.save_adaptation_data();
            self.save_gameplay_data();
        }
        Ok(true)
    }

    /// Observed score of an attempt under the selected adaptation.
    pub fn calculate_score(
        &self,
        adaptation_id: &str,
        correct_answer: f64,
        response_time: f64,
        item_max_duration: f64,
    ) -> Result<Option<f64>, EngineError> {
        let Some(adapter) = self.adapter(adaptation_id) else {
            return Ok(None);
        };
        match adapter.actual_score(correct_answer, response_time, item_max_duration) {
            Ok(score) => Ok(Some(score)),
            Err(e) if !e.is_contract_violation() => {
                tracing::error!(error = %e, "Unable to calculate score");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn calculate_expected_score(
        &self,
        adaptation_id: &str,
        theta: f64,
        beta: f64,
        item_max_duration: f64,
    ) -> Result<Option<f64>, EngineError> {
        let Some(adapter) = self.adapter(adaptation_id) else {
            return Ok(None);
        };
        Ok(Some(adapter.expected_score(theta, beta, item_max_duration)?))
    }

    // ---------------------------------------------------------------------
    // persistence

    fn load_document(&self, key: &str) -> Result<Option<String>, EngineError> {
        let Some(storage) = self.storage.as_deref() else {
            return Ok(None);
        };
        if !storage.exists(key)? {
            return Ok(None);
        }
        Ok(Some(storage.load(key)?))
    }

    fn save_document(&self, key: &str, data: Result<String, StoreError>) -> bool {
        let Some(storage) = self.storage.as_deref() else {
            tracing::error!(key, "Unable to save; no data storage attached");
            return false;
        };
        match data.and_then(|raw| storage.save(key, &raw)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "Unable to save document");
                false
            }
        }
    }

    fn delete_document(&self, key: &str) -> bool {
        let Some(storage) = self.storage.as_deref() else {
            tracing::error!(key, "Unable to delete; no data storage attached");
            return false;
        };
        match storage.delete(key) {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(key, "Unable to delete; the document does not exist");
                false
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Unable to delete document");
                false
            }
        }
    }

    /// Reads players and scenarios from storage, or starts empty when no
    /// document exists yet.
    pub fn load_adaptation_data(&mut self) -> Result<(), EngineError> {
        match self.load_document(keys::ADAPTATION_DATA)? {
            Some(raw) => {
                let doc: AdaptationDocument = store::deserialize(&raw)?;
                self.replace_nodes(doc);
                tracing::info!(
                    players = self.players.len(),
                    scenarios = self.scenarios.len(),
                    "Loaded existing adaptation data"
                );
            }
            None => {
                self.replace_nodes(AdaptationDocument::default());
                tracing::warn!("No existing adaptation data; starting with defaults");
            }
        }
        Ok(())
    }

    pub fn set_adaptation_data(&mut self, raw: &str) -> bool {
        if raw.trim().is_empty() {
            tracing::error!("Invalid string value passed as adaptation data");
            return false;
        }
        match store::deserialize::<AdaptationDocument>(raw) {
            Ok(doc) => {
                self.replace_nodes(doc);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to parse adaptation data");
                false
            }
        }
    }

    pub fn adaptation_data_str(&self) -> Result<String, EngineError> {
        Ok(store::serialize(&AdaptationDocumentRef {
            players: &self.players,
            scenarios: &self.scenarios,
        })?)
    }

    pub fn save_adaptation_data(&self) -> bool {
        let data = store::serialize(&AdaptationDocumentRef {
            players: &self.players,
            scenarios: &self.scenarios,
        });
        self.save_document(keys::ADAPTATION_DATA, data)
    }

    pub fn delete_adaptation_data(&self) -> bool {
        self.delete_document(keys::ADAPTATION_DATA)
    }

    pub fn load_gameplay_data(&mut self) -> Result<(), EngineError> {
        match self.load_document(keys::GAMEPLAY_DATA)? {
            Some(raw) => {
                let doc: GameplayDocument = store::deserialize(&raw)?;
                self.gameplays = doc.gameplays;
                tracing::info!(gameplays = self.gameplays.len(), "Loaded existing gameplay data");
            }
            None => {
                self.gameplays.clear();
                tracing::warn!("No gameplay data found; starting with an empty log");
            }
        }
        Ok(())
    }

    pub fn set_gameplay_data(&mut self, raw: &str) -> bool {
        if raw.trim().is_empty() {
            tracing::error!("Invalid string value passed as gameplay data");
            return false;
        }
        match store::deserialize::<GameplayDocument>(raw) {
            Ok(doc) => {
                self.gameplays = doc.gameplays;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to parse gameplay data");
                false
            }
        }
    }

    pub fn gameplay_data_str(&self) -> Result<String, EngineError> {
        Ok(store::serialize(&GameplayDocumentRef {
            gameplays: &self.gameplays,
        })?)
    }

    pub fn save_gameplay_data(&self) -> bool {
        let data = store::serialize(&GameplayDocumentRef {
            gameplays: &self.gameplays,
        });
        self.save_document(keys::GAMEPLAY_DATA, data)
    }

    pub fn delete_gameplay_data(&self) -> bool {
        self.delete_document(keys::GAMEPLAY_DATA)
    }

    /// Installs a parsed document, dropping invalid and duplicate nodes.
    fn replace_nodes(&mut self, doc: AdaptationDocument) {
        self.players.clear();
        self.scenarios.clear();
        for node in doc.players {
            let duplicate = player_index(&self.players, node.adaptation_id(), node.game_id(), node.player_id()).is_some();
            if !node.is_valid() || duplicate {
                tracing::warn!(player_id = node.player_id(), duplicate, "Skipping player entry");
                continue;
            }
            self.players.push(node);
        }
        for node in doc.scenarios {
            let duplicate = scenario_index(&self.scenarios, node.adaptation_id(), node.game_id(), node.scenario_id()).is_some();
            if !node.is_valid() || duplicate {
                tracing::warn!(scenario_id = node.scenario_id(), duplicate, "Skipping scenario entry");
                continue;
            }
            self.scenarios.push(node);
        }
    }
}

#[derive(Serialize)]
struct AdaptationDocumentRef<'a> {
    players: &'a [PlayerNode],
    scenarios: &'a [ScenarioNode],
}

#[derive(Serialize)]
struct GameplayDocumentRef<'a> {
    gameplays: &'a [Gameplay],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    const GAME: &str = "game";

    fn engine_with_pool() -> TwoA {
        let mut engine = TwoA::with_seed(17);
        assert!(engine.add_player_default(ELO_ADAPTER_TYPE, GAME, "p1"));
        for (id, rating) in [("easy", -2.0), ("mid", 0.0), ("hard", 3.0)] {
            let stats = NodeStats {
                rating,
                ..NodeStats::default()
            };
            assert!(engine.add_scenario(ELO_ADAPTER_TYPE, GAME, id, &stats, 60_000.0));
        }
        engine
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut engine = engine_with_pool();
        assert!(!engine.add_player_default(ELO_ADAPTER_TYPE, GAME, "p1"));
        assert!(!engine.add_scenario_default(ELO_ADAPTER_TYPE, GAME, "mid"));
        assert_eq!(engine.players().len(), 1);
        assert_eq!(engine.scenarios().len(), 3);
        // same id under another adaptation is a different node
        assert!(engine.add_player_default(RT_ADAPTER_TYPE, GAME, "p1"));
    }

    #[test]
    fn unknown_adaptation_is_rejected() {
        let mut engine = TwoA::with_seed(1);
        assert!(!engine.add_player_default("nope", GAME, "p1"));
        assert!(engine.rating_params_mut("nope").is_none());
        assert!(engine.target_scenario_id("nope", GAME, "p1").unwrap().is_none());
    }

    #[test]
    fn required_accessors_raise_on_missing_nodes() {
        let engine = engine_with_pool();
        assert!(matches!(
            engine.player_param(ELO_ADAPTER_TYPE, GAME, "ghost", NodeAttribute::Rating),
            Err(EngineError::PlayerNotFound { .. })
        ));
        assert_eq!(
            engine
                .scenario_param(ELO_ADAPTER_TYPE, GAME, "hard", NodeAttribute::Rating)
                .unwrap(),
            AttrValue::Rating(3.0)
        );
        assert!(engine
            .get_scenario_attr(ELO_ADAPTER_TYPE, GAME, "ghost", NodeAttribute::Rating)
            .is_none());
    }

    #[test]
    fn attribute_setters_validate() {
        let mut engine = engine_with_pool();
        assert!(!engine.set_player_attr(ELO_ADAPTER_TYPE, GAME, "p1", AttrValue::Uncertainty(3.0)));
        assert!(!engine.set_player_attr(ELO_ADAPTER_TYPE, GAME, "p1", AttrValue::TimeLimit(5.0)));
        assert!(engine.set_player_attr(ELO_ADAPTER_TYPE, GAME, "p1", AttrValue::Rating(2.5)));
        assert!(engine.set_scenario_attr(ELO_ADAPTER_TYPE, GAME, "mid", AttrValue::TimeLimit(5.0)));
        assert_eq!(
            engine
                .get_player_attr(ELO_ADAPTER_TYPE, GAME, "p1", NodeAttribute::Rating)
                .and_then(|v| v.as_f64()),
            Some(2.5)
        );
    }

    #[test]
    fn update_appends_gameplay_and_moves_ratings() {
        let mut engine = engine_with_pool();
        let ok = engine
            .update_ratings(ELO_ADAPTER_TYPE, GAME, "p1", "mid", &RatingUpdate::new(0.0, 1.0), false)
            .unwrap();
        assert!(ok);
        assert_eq!(engine.gameplays().len(), 1);
        let record = &engine.gameplays()[0];
        assert_eq!(record.scenario_id(), "mid");
        let player = engine.player(ELO_ADAPTER_TYPE, GAME, "p1").unwrap();
        assert_eq!(player.play_count(), 1);
        assert_eq!(record.player_rating(), player.rating());
        assert!(engine.scenario(ELO_ADAPTER_TYPE, GAME, "mid").unwrap().rating() < 0.0);
    }

    #[test]
    fn invalid_accuracy_returns_false_without_log_entry() {
        let mut engine = engine_with_pool();
        let ok = engine
            .update_ratings(ELO_ADAPTER_TYPE, GAME, "p1", "mid", &RatingUpdate::new(0.0, 1.5), false)
            .unwrap();
        assert!(!ok);
        assert!(engine.gameplays().is_empty());
    }

    #[test]
    fn non_finite_rating_returns_false_without_log_entry() {
        let mut engine = TwoA::with_seed(3);
        let strong = NodeStats {
            rating: 400.0,
            ..NodeStats::default()
        };
        assert!(engine.add_player(RT_ADAPTER_TYPE, GAME, "p1", &strong));
        assert!(engine.add_scenario(RT_ADAPTER_TYPE, GAME, "s1", &NodeStats::default(), 900_000.0));
        let ok = engine
            .update_ratings(RT_ADAPTER_TYPE, GAME, "p1", "s1", &RatingUpdate::new(1000.0, 1.0), false)
            .unwrap();
        assert!(!ok);
        assert!(engine.gameplays().is_empty());
        let player = engine.player(RT_ADAPTER_TYPE, GAME, "p1").unwrap();
        assert_eq!(player.rating(), 400.0);
        assert_eq!(player.play_count(), 0);
    }

    #[test]
    fn response_time_contract_violation_is_raised() {
        let mut engine = TwoA::with_seed(3);
        assert!(engine.add_player_default(RT_ADAPTER_TYPE, GAME, "p1"));
        assert!(engine.add_scenario_default(RT_ADAPTER_TYPE, GAME, "s1"));
        let err = engine
            .update_ratings(RT_ADAPTER_TYPE, GAME, "p1", "s1", &RatingUpdate::new(0.0, 1.0), false)
            .unwrap_err();
        assert!(matches!(err, EngineError::Adapter(AdapterError::InvalidResponseTime(_))));
        assert!(engine.calculate_score(RT_ADAPTER_TYPE, 1.0, -5.0, 100.0).is_err());
        assert_eq!(
            engine.calculate_score(ELO_ADAPTER_TYPE, 0.4, 0.0, 0.0).unwrap(),
            Some(0.4)
        );
    }

    #[test]
    fn empty_pool_is_a_contract_violation() {
        let mut engine = TwoA::with_seed(3);
        assert!(engine.add_player_default(ELO_ADAPTER_TYPE, GAME, "p1"));
        assert!(matches!(
            engine.target_scenario_id(ELO_ADAPTER_TYPE, GAME, "p1"),
            Err(EngineError::Adapter(AdapterError::EmptyScenarioList { .. }))
        ));
    }

    #[test]
    fn custom_distribution_leaves_adapter_untouched() {
        let mut engine = engine_with_pool();
        let custom = TargetDistribution {
            mean: 0.5,
            sd: 0.1,
            lower_limit: 0.2,
            upper_limit: 0.8,
        };
        let rating = engine
            .target_difficulty_rating_custom(ELO_ADAPTER_TYPE, GAME, "p1", custom)
            .unwrap();
        assert!((rating - 0.01).abs() < 1e-12);
        assert!(engine
            .target_scenario_custom(ELO_ADAPTER_TYPE, GAME, "p1", custom)
            .unwrap()
            .is_some());
        assert_eq!(
            engine.elo_adapter(ELO_ADAPTER_TYPE).unwrap().target_distribution(),
            TargetDistribution::default()
        );
        assert!(engine
            .target_difficulty_rating_custom(RT_ADAPTER_TYPE, GAME, "p1", custom)
            .is_none());
    }

    #[test]
    fn documents_round_trip_through_storage() {
        let mut engine = engine_with_pool().with_storage(Box::new(MemoryStorage::new()));
        engine
            .update_ratings(ELO_ADAPTER_TYPE, GAME, "p1", "easy", &RatingUpdate::new(0.0, 0.0), true)
            .unwrap();

        let mut reloaded = TwoA::with_seed(5);
        assert!(reloaded.set_adaptation_data(&engine.adaptation_data_str().unwrap()));
        assert!(reloaded.set_gameplay_data(&engine.gameplay_data_str().unwrap()));
        assert_eq!(reloaded.players().len(), 1);
        assert_eq!(reloaded.scenarios().len(), 3);
        let easy = reloaded.scenario(ELO_ADAPTER_TYPE, GAME, "easy").unwrap();
        assert_eq!(easy.play_count(), 1);
        assert_eq!(easy.time_limit(), 60_000.0);
        assert_eq!(reloaded.gameplays().len(), 1);
        assert_eq!(reloaded.gameplays()[0].timestamp(), engine.gameplays()[0].timestamp());

        assert!(engine.delete_gameplay_data());
        assert!(!engine.delete_gameplay_data());
        engine.load_gameplay_data().unwrap();
        assert!(engine.gameplays().is_empty());
    }

    #[test]
    fn saving_without_storage_fails_softly() {
        let engine = engine_with_pool();
        assert!(!engine.save_adaptation_data());
        assert!(!engine.delete_adaptation_data());
    }
}
