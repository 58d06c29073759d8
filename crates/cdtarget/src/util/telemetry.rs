use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize tracing
///
/// Honours `RUST_LOG`, falling back to `info`. Set `LOG_FORMAT=json` for structured output.
pub async fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    let (compact, structured) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer().compact()), None)
    };

    let collector = Registry::default().with(env_filter).with(compact).with(structured);

    if tracing::subscriber::set_global_default(collector).is_err() {
        tracing::warn!("global tracing subscriber already installed");
    }
}
