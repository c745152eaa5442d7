use std::fs;
use std::process::ExitCode;

use serde::Deserialize;
use thiserror::Error;
use twoa_engine::adaptation::{EngineConfig, EngineError, TwoA};
use twoa_engine::config::Config;
use twoa_engine::ks::{KsError, KsGenerator, PCategory, XmlFactory};
use twoa_engine::logging::init_tracing;
use twoa_engine::store::{keys, DataStorage, SledStorage, StoreError};

#[derive(Debug, Error)]
enum RunError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error("knowledge structure: {0}")]
    Ks(#[from] KsError),
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("engine config: {0}")]
    EngineConfig(String),
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: String,
    rating: f64,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    if let Err(e) = init_tracing(&config.log_config()) {
        eprintln!("Failed to initialize tracing: {e}");
        return ExitCode::FAILURE;
    }
    tracing::info!("Starting twoa-engine");

    match run(&config) {
        Ok(()) => {
            tracing::info!("Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "twoa-engine failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), RunError> {
    let storage = SledStorage::open(&config.sled_path)?;

    let mut engine = match config.rng_seed {
        Some(seed) => TwoA::with_seed(seed),
        None => TwoA::new(),
    }
    .with_storage(Box::new(storage.clone()));

    if let Some(path) = &config.engine_config_file {
        let engine_config: EngineConfig = read_json(path)?;
        engine
            .apply_config(&engine_config)
            .map_err(RunError::EngineConfig)?;
        tracing::info!(path = %path, "Applied engine config");
    }

    engine.load_adaptation_data()?;
    engine.load_gameplay_data()?;
    tracing::info!(
        players = engine.players().len(),
        scenarios = engine.scenarios().len(),
        gameplays = engine.gameplays().len(),
        "Adaptation data ready"
    );

    if let Some(path) = &config.ks.categories_file {
        let xml = build_knowledge_structure(path, config.ks.threshold)?;
        storage.save(keys::KNOWLEDGE_STRUCTURE, &xml)?;
        tracing::info!(key = keys::KNOWLEDGE_STRUCTURE, bytes = xml.len(), "Knowledge structure stored");
    }

    if config.update_datafiles {
        let saved = engine.save_adaptation_data() && engine.save_gameplay_data();
        if !saved {
            tracing::warn!("Some data files were not saved");
        }
    }

    tracing::info!("Flushing store before exit");
    storage.flush()?;
    Ok(())
}

fn build_knowledge_structure(path: &str, threshold: f64) -> Result<String, RunError> {
    let entries: Vec<CategoryEntry> = read_json(path)?;
    let categories: Vec<PCategory> = entries
        .into_iter()
        .map(|e| PCategory::new(e.id, e.rating))
        .collect();

    let generator = KsGenerator::with_threshold(threshold)?;
    let rank_order = generator.create_rank_order_from_cats(&categories)?;
    let mut ks = generator.create_kstructure(&rank_order)?;
    generator.create_expanded_kstructure(&mut ks)?;
    tracing::info!(
        categories = categories.len(),
        ranks = ks.rank_count(),
        states = ks.state_count(),
        "Knowledge structure built"
    );

    Ok(XmlFactory::new().create_xml(&ks)?)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T, RunError> {
    let raw = fs::read_to_string(path).map_err(|source| RunError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RunError::Json {
        path: path.to_string(),
        source,
    })
}
