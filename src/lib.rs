// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use auth::SessionValidator;
use config::Config;
use services::{
    ingestion::IngestionPipeline, market_data::MarketDataService,
    preferences::PreferencesService, yahoo::YahooFinanceService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub sessions: SessionValidator,
    pub ingestion: IngestionPipeline,
    pub market: MarketDataService,
    pub preferences: PreferencesService,
    pub yahoo: YahooFinanceService,
}

impl AppState {
    /// Wire every service onto one pool. Fails when the identity-provider
    /// settings are unusable.
    pub fn new(db: DatabaseConnection, config: Config) -> Result<Self, config::ConfigError> {
        let sessions = SessionValidator::new(&config.auth)?;
        let yahoo = YahooFinanceService::new(&config.market)?;

        Ok(Self {
            ingestion: IngestionPipeline::new(db.clone()),
            market: MarketDataService::new(db.clone()),
            preferences: PreferencesService::new(db.clone()),
            db,
            config: Arc::new(config),
            sessions,
            yahoo,
        })
    }
}

pub mod entities {
    pub mod prelude;
    pub mod market_data;
    pub mod user_preferences;
}

pub mod services {
    pub mod record_validator;
    pub mod ingestion;
    pub mod market_data;
    pub mod preferences;
    pub mod yahoo;
}

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod handlers;
pub mod router;
