/*!
 * OS Emulator - Main Entry Point
 *
 * Loads the configuration, runs the batch generator for a while, then prints
 * the final system report as JSON.
 *
 * Environment variables:
 * - EMULATOR_CONFIG: configuration file (default: config.txt, overridden by argv[1])
 * - EMULATOR_RUN_SECS: how long to generate load (default: 5)
 */

use miette::{IntoDiagnostic, Result};
use os_emulator::{init_tracing, EmulatorConfig, ResourceManager};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.txt";
const DEFAULT_RUN_SECS: u64 = 5;

fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("EMULATOR_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let run_secs = match std::env::var("EMULATOR_RUN_SECS") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(value = %raw, "Invalid EMULATOR_RUN_SECS, using default");
            DEFAULT_RUN_SECS
        }),
        Err(_) => DEFAULT_RUN_SECS,
    };

    info!(path = %config_path, "Loading configuration");
    let config = EmulatorConfig::load(&config_path)?;

    let manager = ResourceManager::initialize(config)?;
    manager.start_batch_generator()?;

    info!(seconds = run_secs, "Generating processes");
    std::thread::sleep(Duration::from_secs(run_secs));
    manager.stop_batch_generator();

    let report = manager.report();
    manager.shutdown();

    let json = report.to_json_pretty().into_diagnostic()?;
    println!("{}", json);
    Ok(())
}
