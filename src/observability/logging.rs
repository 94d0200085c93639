use axum::http::Request;
use tracing::Span;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

use crate::config::ApplicationSettings;

const TOKEN_PREFIX_LEN: usize = 8;

/// Subscriber settings derived from `[application]`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
    pub include_file: bool,
    pub include_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
            include_file: false,
            include_line: false,
        }
    }
}

impl LogConfig {
    pub fn from_settings(settings: &ApplicationSettings) -> Self {
        let format = LogFormat::from(settings.log_format.as_str());
        Self {
            level: settings.log_level.clone(),
            format,
            // Source locations only help when reading logs locally.
            include_file: format == LogFormat::Pretty && settings.log_level == "debug",
            include_line: format == LogFormat::Pretty && settings.log_level == "debug",
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn fmt_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_target(config.include_target)
        .with_file(config.include_file)
        .with_line_number(config.include_line);

    match config.format {
        // Close events carry span timings for the request spans below.
        LogFormat::Json => layer.json().with_span_events(FmtSpan::CLOSE).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(env_filter)
        .try_init()?;

    tracing::info!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

/// Span for one HTTP request, tagged with the id set by the request-id layer.
pub fn http_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

/// Keeps `visible_chars` at each end and stars out the middle.
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    if value.len() <= visible_chars * 2 {
        return "*".repeat(value.len());
    }

    let prefix = &value[..visible_chars];
    let suffix = &value[value.len() - visible_chars..];
    let masked_len = value.len() - (visible_chars * 2);

    format!("{}{}{}", prefix, "*".repeat(masked_len), suffix)
}

/// Shortens a bearer or refresh token to a loggable prefix.
pub fn mask_token(token: &str) -> String {
    match token.get(..TOKEN_PREFIX_LEN) {
        Some(prefix) if token.len() > TOKEN_PREFIX_LEN => format!("{}...", prefix),
        _ => "*".repeat(token.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token_keeps_prefix() {
        let token = "0123456789abcdef0123456789abcdef";
        assert_eq!(mask_token(token), "01234567...");
        assert_eq!(mask_token("12345678"), "********");
    }

    #[test]
    fn test_debug_pretty_logs_include_source_location() {
        let settings = ApplicationSettings {
            log_level: "debug".to_string(),
            log_format: "pretty".to_string(),
            ..ApplicationSettings::default()
        };
        let config = LogConfig::from_settings(&settings);
        assert!(config.include_file);
        assert!(config.include_line);

        let json = LogConfig::from_settings(&ApplicationSettings {
            log_format: "json".to_string(),
            ..settings
        });
        assert!(!json.include_file);
    }

    #[test]
    fn test_http_span_reads_request_id() {
        let request = Request::builder()
            .uri("/create-campaign")
            .header("x-request-id", "abc")
            .body(())
            .unwrap();
        // No subscriber is installed, so the span is disabled but must still build.
        let _span = http_span(&request);
    }
}
