//! Caption Refresh
//!
//! Regenerates catalog captions at startup and then once per interval until
//! interrupted with Ctrl-C. A second Ctrl-C exits immediately.

use anyhow::Result;
use tracing::{error, info, warn};

use caption_refresh::bootstrap;
use caption_refresh::config::PipelineConfig;
use caption_refresh::utils::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = PipelineConfig::from_env()?;
    let _log_guard = init_logging(config.log_dir.as_deref())?;

    info!(
        "Caption refresh v{} starting (model {}, every {:?})",
        env!("CARGO_PKG_VERSION"),
        config.model,
        config.interval
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received, finishing the current record (press again to exit now)");

        tokio::spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Second Ctrl-C, exiting without waiting for the current record");
                std::process::exit(130);
            }
        });
    };

    match bootstrap::run(&config, shutdown).await {
        Ok(stats) => {
            info!("Caption refresh stopped after {} cycles", stats.triggered);
            Ok(())
        }
        Err(e) => {
            error!("Fatal: {:#}", e);
            Err(e)
        }
    }
}
