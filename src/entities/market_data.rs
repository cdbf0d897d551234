//! `SeaORM` Entity for market_data table
//!
//! One daily OHLCV observation. `(symbol, date, source)` is the natural key
//! and is backed by a unique index.

use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "market_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub symbol: String,
    pub date: Date,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub source: DataSource,
    /// Assigned by the store on first insert, never touched by upserts
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Closed set of feeds a row may come from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[sea_orm(string_value = "yahoo")]
    Yahoo,
    #[sea_orm(string_value = "mirae")]
    Mirae,
    #[sea_orm(string_value = "manual")]
    Manual,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [DataSource::Yahoo, DataSource::Mirae, DataSource::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Yahoo => "yahoo",
            DataSource::Mirae => "mirae",
            DataSource::Manual => "manual",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| format!("unknown source '{}' (expected one of yahoo, mirae, manual)", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_through_str() {
        for source in DataSource::ALL {
            assert_eq!(source.as_str().parse::<DataSource>(), Ok(source));
        }
    }

    #[test]
    fn test_source_rejects_unknown_and_case_variants() {
        assert!("bloomberg".parse::<DataSource>().is_err());
        assert!("Yahoo".parse::<DataSource>().is_err());
    }
}
