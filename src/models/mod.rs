pub mod auth;
pub mod common;
pub mod market_data;
pub mod preferences;
