/// Adaptation id of the response-time model
pub const RT_ADAPTER_TYPE: &str = "Game difficulty - Player skill";

/// Adaptation id of the accuracy-only Elo model
pub const ELO_ADAPTER_TYPE: &str = "SkillDifficultyElo";

/// Initial K factor of a new player or scenario
pub const INITIAL_K_FCT: f64 = 0.0375;

/// Initial rating of a new player or scenario
pub const INITIAL_RATING: f64 = 0.01;

/// Initial (maximum) rating uncertainty
pub const INITIAL_UNCERTAINTY: f64 = 1.0;

/// Default scenario time limit in milliseconds
pub const DEFAULT_TIME_LIMIT: f64 = 90_000.0;

/// Last-played timestamp given to nodes created without one
pub const DEFAULT_DATETIME: &str = "2015-07-22T11:56:17";

/// Sortable timestamp layout used in every persisted document
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Probabilities are clamped into [DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT] before the logit transform
pub const DISTR_LOWER_LIMIT: f64 = 0.001;
pub const DISTR_UPPER_LIMIT: f64 = 0.999;

/// Base K factor scaled by the uncertainty terms
pub const DEF_K: f64 = 0.0075;
/// Weight of the rated node's own uncertainty in its K factor
pub const DEF_K_UP: f64 = 4.0;
/// Weight of the opponent's uncertainty in the K factor
pub const DEF_K_DOWN: f64 = 0.5;

/// Days of inactivity after which uncertainty reaches its maximum
pub const DEF_MAX_DELAY: f64 = 30.0;

/// Administrations needed to bring uncertainty down to its minimum
pub const DEF_MAX_PLAY: f64 = 40.0;

/// Mean of the normal distribution the target success probability is drawn from
pub const TARGET_DISTR_MEAN: f64 = 0.75;
/// Standard deviation of the target success probability
pub const TARGET_DISTR_SD: f64 = 0.1;
/// Exclusive bounds of an accepted target probability draw
pub const TARGET_LOWER_LIMIT: f64 = 0.5;
pub const TARGET_UPPER_LIMIT: f64 = 1.0;

/// Elo fuzzy interval width in standard deviations
pub const FI_SD_MULTIPLIER: f64 = 1.0;
/// Elo logistic base and its logit step
pub const DEF_EXPECT_SCORE_MAGNIFIER: f64 = 10.0;
pub const DEF_MAGNIFIER_STEP_SIZE: f64 = 2.302573;

/// Knowledge structure defaults
pub const DEFAULT_KS_THRESHOLD: f64 = 0.1;
pub const DEFAULT_SAME_PROBABILITY: f64 = 0.5;
pub const UNASSIGNED_RATING: f64 = -9999.99;
pub const MIN_KS_THRESHOLD: f64 = 0.0;
pub const MAX_KS_THRESHOLD: f64 = 1.0;
pub const MIN_SAME_PROBABILITY: f64 = 0.0;
pub const MAX_SAME_PROBABILITY: f64 = 1.0;
pub const UNASSIGNED_THRESHOLD: f64 = -1.0;
