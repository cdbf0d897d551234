use serde::{Deserialize, Serialize};

use crate::entities::market_data::DataSource;

/// Body of `PUT /api/v1/preferences`. Only these three fields may be
/// changed; anything else is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePreferencesRequest {
    pub default_source: Option<DataSource>,
    pub selected_symbols: Option<Vec<String>>,
    pub watchlist: Option<Vec<String>>,
}

impl UpdatePreferencesRequest {
    pub fn is_empty(&self) -> bool {
        self.default_source.is_none() && self.selected_symbols.is_none() && self.watchlist.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_field_is_rejected() {
        let body = json!({"watchlist": ["BBCA.JK"], "email": "x@example.com"});
        assert!(serde_json::from_value::<UpdatePreferencesRequest>(body).is_err());
    }

    #[test]
    fn test_partial_update() {
        let body = json!({"default_source": "mirae"});
        let request: UpdatePreferencesRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.default_source, Some(DataSource::Mirae));
        assert!(request.watchlist.is_none());
        assert!(!request.is_empty());
        assert!(UpdatePreferencesRequest::default().is_empty());
    }
}
