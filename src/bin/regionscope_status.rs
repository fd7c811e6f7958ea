//! regionscope-status: print region configuration and discovery cache state.
//!
//! Reads the configured region list and today's discovery record and prints
//! them as JSON on stdout. Never calls the usage API, and does not count as a
//! discovery request.
//!
//! ## Usage
//! ```text
//! regionscope-status [CONFIG_FILE]
//! ```
//!
//! ## Configuration
//! - REGIONSCOPE_CONFIG: YAML configuration file (optional)
//! - REGIONSCOPE__STORAGE__ENV_FILE, REGIONSCOPE__STORAGE__CACHE_FILE: storage overrides
//! - REGIONSCOPE_LOG: log filter (default: info), written to stderr

use std::sync::Arc;

use tracing::{error, info};

use regionscope::config::Config;
use regionscope::service::RegionService;
use regionscope::utils::bootstrap::init_tracing;
use regionscope::utils::clock::SystemClock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    info!(
        env_file = %config.storage.env_file.display(),
        cache_file = %config.storage.cache_file.display(),
        "regionscope-status started"
    );

    let service = RegionService::new(config, Arc::new(SystemClock));
    match service.status().await {
        Ok(status) => {
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Err(e) => {
            let descriptor = e.descriptor();
            error!(code = %descriptor.code, error = %descriptor.message, "Status failed");
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
            Err(e.into())
        }
    }
}
