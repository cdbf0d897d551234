use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QuerySelect, Set,
    TransactionTrait,
};

use crate::entities::market_data::DataSource;
use crate::entities::prelude::UserPreferences;
use crate::entities::user_preferences::{self, Column, SymbolSet};
use crate::models::preferences::UpdatePreferencesRequest;

pub const DEFAULT_SELECTED_SYMBOLS: [&str; 3] = ["BBCA.JK", "BBRI.JK", "TLKM.JK"];
pub const DEFAULT_WATCHLIST: [&str; 4] = ["BBCA.JK", "BBRI.JK", "TLKM.JK", "ASII.JK"];

/// Per-user settings keyed by the identity provider's identity id. Rows are
/// created lazily the first time a user is seen.
#[derive(Clone)]
pub struct PreferencesService {
    db: DatabaseConnection,
}

impl PreferencesService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_or_create(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<user_preferences::Model, DbErr> {
        ensure_row(&self.db, user_id, email).await?;
        find(&self.db, user_id).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        email: Option<&str>,
        request: UpdatePreferencesRequest,
    ) -> Result<user_preferences::Model, DbErr> {
        self.modify(user_id, email, move |prefs| {
            if let Some(source) = request.default_source {
                prefs.default_source = source;
            }
            if let Some(symbols) = request.selected_symbols {
                prefs.selected_symbols = SymbolSet::new(symbols);
            }
            if let Some(symbols) = request.watchlist {
                prefs.watchlist = SymbolSet::new(symbols);
            }
        })
        .await
    }

    pub async fn add_to_watchlist(
        &self,
        user_id: &str,
        email: Option<&str>,
        symbol: &str,
    ) -> Result<user_preferences::Model, DbErr> {
        let symbol = symbol.to_string();
        self.modify(user_id, email, move |prefs| {
            prefs.watchlist.insert(symbol);
        })
        .await
    }

    pub async fn remove_from_watchlist(
        &self,
        user_id: &str,
        email: Option<&str>,
        symbol: &str,
    ) -> Result<user_preferences::Model, DbErr> {
        self.modify(user_id, email, |prefs| {
            prefs.watchlist.remove(symbol);
        })
        .await
    }

    /// Read-modify-write with the row locked for the duration.
    async fn modify<F>(
        &self,
        user_id: &str,
        email: Option<&str>,
        change: F,
    ) -> Result<user_preferences::Model, DbErr>
    where
        F: FnOnce(&mut user_preferences::Model),
    {
        let txn = self.db.begin().await?;

        ensure_row(&txn, user_id, email).await?;
        let mut prefs = UserPreferences::find_by_id(user_id.to_string())
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("preferences for {}", user_id)))?;

        change(&mut prefs);

        let active = user_preferences::ActiveModel {
            user_id: Set(prefs.user_id),
            default_source: Set(prefs.default_source),
            selected_symbols: Set(prefs.selected_symbols),
            watchlist: Set(prefs.watchlist),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        tracing::info!("Updated preferences for user {}", user_id);
        Ok(updated)
    }
}

/// Insert default preferences unless the user already has a row. An existing
/// row only gets its email refreshed.
async fn ensure_row<C>(conn: &C, user_id: &str, email: Option<&str>) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();
    let row = user_preferences::ActiveModel {
        user_id: Set(user_id.to_string()),
        email: Set(email.unwrap_or_default().to_string()),
        default_source: Set(DataSource::Yahoo),
        selected_symbols: Set(SymbolSet::new(DEFAULT_SELECTED_SYMBOLS)),
        watchlist: Set(SymbolSet::new(DEFAULT_WATCHLIST)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let mut on_conflict = OnConflict::column(Column::UserId);
    match email {
        Some(_) => on_conflict.update_columns([Column::Email, Column::UpdatedAt]),
        None => on_conflict.do_nothing(),
    };

    UserPreferences::insert(row)
        .on_conflict(on_conflict)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn find<C>(conn: &C, user_id: &str) -> Result<user_preferences::Model, DbErr>
where
    C: ConnectionTrait,
{
    UserPreferences::find_by_id(user_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("preferences for {}", user_id)))
}
