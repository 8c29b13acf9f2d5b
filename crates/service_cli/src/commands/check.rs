//! Check command implementation
//!
//! Loads and validates a run configuration without simulating anything.

use exposure_xva::assign_trades;
use tracing::info;

use crate::config::RunConfig;
use crate::Result;

/// Run the check command
pub fn run(config_path: &str, samples: Option<usize>) -> Result<()> {
    info!("Checking configuration...");
    info!("  Configuration: {}", config_path);

    let config = RunConfig::load(config_path)?.with_sample_override(samples);
    config.validate()?;

    let grid = config.date_grid()?;
    let model = config.cross_asset_model()?;
    let portfolio = config.portfolio()?;
    let netting_sets = assign_trades(config.netting_sets(), &portfolio)?;
    let early_exercise = portfolio.early_exercise_trades().count();

    info!(
        dates = grid.len(),
        factors = model.dim(),
        samples = config.simulation.samples,
        trades = portfolio.len(),
        early_exercise,
        netting_sets = netting_sets.len(),
        counterparties = config.counterparties.len(),
        "Configuration is valid"
    );
    println!(
        "OK: {} trade(s) in {} netting set(s), {} date(s), {} factor(s), {} sample(s)",
        portfolio.len(),
        netting_sets.len(),
        grid.len(),
        model.dim(),
        config.simulation.samples
    );
    Ok(())
}
