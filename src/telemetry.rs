pub fn logs_are_json() -> bool {
    matches!(std::env::var("DIGEST_LOG_FORMAT").as_deref(), Ok("json"))
}

/// Initialize tracing according to RUST_LOG and DIGEST_LOG_FORMAT.
/// - Defaults to `info` if `RUST_LOG` is unset
/// - `DIGEST_LOG_FORMAT=json` switches to JSON lines
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::registry().with(filter);

    if logs_are_json() {
        let _ = builder.with(fmt::layer().json().flatten_event(true)).try_init();
    } else {
        let _ = builder.with(fmt::layer().compact()).try_init();
    }
}
