//! `SeaORM` Entity prelude

pub use super::market_data::Entity as MarketData;
pub use super::user_preferences::Entity as UserPreferences;
