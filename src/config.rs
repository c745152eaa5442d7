use std::env;
use std::str::FromStr;

use crate::constants::DEFAULT_KS_THRESHOLD;
use crate::logging::LogConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub rng_seed: Option<u64>,
    pub ks: KsEnvConfig,
    pub update_datafiles: bool,
    pub engine_config_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KsEnvConfig {
    pub threshold: f64,
    pub categories_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/twoa.sled"),
            rng_seed: env_opt_parse("TWOA_RNG_SEED"),
            ks: KsEnvConfig {
                threshold: env_or_parse("TWOA_KS_THRESHOLD", DEFAULT_KS_THRESHOLD),
                categories_file: env_opt("TWOA_CATEGORIES_FILE"),
            },
            update_datafiles: env_or_bool("TWOA_UPDATE_DATAFILES", true),
            engine_config_file: env_opt("TWOA_ENGINE_CONFIG"),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_level: self.log_level.clone(),
            enable_file_logs: self.enable_file_logs,
            log_dir: self.log_dir.clone(),
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset or blank values give `None`.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    env_opt_parse(key).unwrap_or(default)
}

pub fn env_opt_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    let raw = env_opt(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Failed to parse env var, using default");
            None
        }
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
