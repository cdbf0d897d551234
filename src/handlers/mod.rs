pub mod auth;
pub mod health;
pub mod market_data;
pub mod preferences;
pub mod upload;
