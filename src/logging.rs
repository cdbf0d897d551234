use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, LoggerConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` is used for everything
/// and this crate logs at debug. Production emits JSON lines.
pub fn init(config: &LoggerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},market_data_backend=debug", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match config.environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
        Environment::Development => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Session credentials are never logged in full.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
