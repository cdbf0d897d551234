//! `SeaORM` Entity for user_preferences table

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use super::market_data::DataSource;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_preferences")]
pub struct Model {
    /// Identity id issued by the identity provider
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub email: String,
    pub default_source: DataSource,
    #[sea_orm(column_type = "Json")]
    pub selected_symbols: SymbolSet,
    #[sea_orm(column_type = "Json")]
    pub watchlist: SymbolSet,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Insertion-ordered set of symbols, stored as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct SymbolSet(Vec<String>);

impl SymbolSet {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = SymbolSet::default();
        for symbol in symbols {
            set.insert(symbol);
        }
        set
    }

    /// Returns false when the symbol was already present.
    pub fn insert(&mut self, symbol: impl Into<String>) -> bool {
        let symbol = symbol.into();
        if self.contains(&symbol) {
            return false;
        }
        self.0.push(symbol);
        true
    }

    /// Returns false when the symbol was not present.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|s| s != symbol);
        self.0.len() != before
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.iter().any(|s| s == symbol)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
