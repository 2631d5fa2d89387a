//! Sends a sample digest through the configured channels (log only when none are configured).

use activity_digest::config::AppConfig;
use activity_digest::notify::NotifierMux;

const SAMPLE: &str = "# octocat/hello-world activity (2026-10-15 to 2026-10-16)\n\n\
## New Features\n- Added a greeting endpoint (#42)\n\n\
## Bug Fixes\n- Fixed a typo in the README\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = AppConfig::load_default()?;
    let mux = NotifierMux::from_config(&cfg.notify);
    if mux.is_empty() {
        tracing::info!("no channels configured; sample digest follows");
        println!("{SAMPLE}");
        return Ok(());
    }

    let outcome = mux.notify("[Digest] demo", SAMPLE).await;
    println!(
        "notify-demo done: channels={:?} sent={} failed={}",
        mux.channels(),
        outcome.sent,
        outcome.failed
    );
    Ok(())
}
