//! Run command implementation
//!
//! Drives one exposure run end to end:
//! scenarios -> AMC training -> NPV cube -> netting and collateral ->
//! exposure profiles -> XVA -> trade allocation -> CSV reports.

use std::path::{Path, PathBuf};
use std::time::Instant;

use exposure_core::{CancellationToken, EngineError};
use exposure_cube::{AmcTrainer, AmcTraining, CubeBuilder, NpvCube, ValuationReport};
use exposure_scenario::ScenarioGenerator;
use exposure_xva::{
    assign_trades, AllocationMethod, ExposureAllocator, ExposureProfile, NettingAggregator,
    PortfolioXva, TradeAllocation, XvaCalculator,
};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::report::{write_reports, ReportFiles};
use crate::Result;

/// Everything a run produces.
#[derive(Debug)]
pub struct RunOutput {
    pub cube: NpvCube,
    /// AMC training and cube valuation failures
    pub valuation_report: ValuationReport,
    pub trade_profiles: Vec<ExposureProfile>,
    pub netting_set_profiles: Vec<ExposureProfile>,
    pub xva: PortfolioXva,
    /// Allocated trade profiles and charges, empty when allocation is off
    pub allocations: Vec<TradeAllocation>,
}

/// Run the run command
pub fn run(config_path: &str, samples: Option<usize>, output_dir: Option<PathBuf>) -> Result<()> {
    info!("Starting exposure run...");
    info!("  Configuration: {}", config_path);

    // The override must land before any generator is built.
    let config = RunConfig::load(config_path)?
        .with_sample_override(samples)
        .with_output_dir(output_dir);
    info!("  Samples: {}", config.simulation.samples);
    info!("  Output directory: {}", config.output.dir.display());

    let started = Instant::now();
    let output = execute(&config, None)?;
    let files = write_reports(&output, &config.output)?;
    print_summary(&output, &files, &config.output.dir);

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        files = files.len(),
        "Exposure run complete"
    );
    Ok(())
}

/// Runs the pipeline for a validated configuration without writing anything.
///
/// # Errors
/// `CliError` wrapping the first configuration, state or cancellation error;
/// per-trade valuation failures are collected in the output instead.
pub fn execute(config: &RunConfig, cancel: Option<CancellationToken>) -> Result<RunOutput> {
    config.validate()?;
    let grid = config.date_grid()?;
    let model = config.cross_asset_model()?;
    let market = config.market_data()?;
    let portfolio = config.portfolio()?;
    let netting_sets = assign_trades(config.netting_sets(), &portfolio)?;

    // Phase one: backward sweep on independent training paths.
    let training = if portfolio.early_exercise_trades().next().is_some() {
        let generator =
            ScenarioGenerator::new(model.clone(), grid.clone(), config.training_config()?)?;
        let training_scenarios = generator.generate();
        AmcTrainer::new(&training_scenarios, &market, config.regression.clone())
            .train_portfolio(&portfolio, cancel.as_ref())?
    } else {
        AmcTraining::default()
    };

    // Phase two: forward valuation with the frozen models.
    let scenarios = ScenarioGenerator::new(model, grid, config.scenario_config()?)?.generate();
    let mut builder = CubeBuilder::new(&scenarios, &portfolio, &market)
        .with_amc_models(&training.models);
    if let Some(token) = cancel {
        builder = builder.with_cancellation(token);
    }
    let build = builder.build()?;

    let mut valuation_report = training.report;
    valuation_report.merge(build.report);
    if !valuation_report.is_empty() {
        warn!(
            errors = valuation_report.len(),
            "Run completed with valuation errors"
        );
    }
    let cube = build.cube;

    let exposures = NettingAggregator::new(&cube, config.collateral_calculation)
        .map_err(EngineError::from)?
        .aggregate_all(&netting_sets)?;
    let trade_profiles = ExposureProfile::trades(&cube, &config.exposure);
    let netting_set_profiles: Vec<ExposureProfile> = exposures
        .iter()
        .map(|e| ExposureProfile::netting_set(e, &config.exposure))
        .collect();

    let calculator = config
        .counterparties()?
        .into_iter()
        .try_fold(XvaCalculator::new(config.xva_config()?), |calc, cp| {
            calc.with_counterparty(cp)
        })?;
    let xva = calculator.portfolio_xva(&netting_set_profiles)?;
    let allocations = match config.allocation.method {
        AllocationMethod::None => Vec::new(),
        _ => ExposureAllocator::new(&cube, &calculator, config.allocation)?.allocate_all(
            &netting_sets,
            &exposures,
            &netting_set_profiles,
        )?,
    };

    Ok(RunOutput {
        cube,
        valuation_report,
        trade_profiles,
        netting_set_profiles,
        xva,
        allocations,
    })
}

fn print_summary(output: &RunOutput, files: &ReportFiles, dir: &Path) {
    println!("\n┌──────────────────┬──────────────┬──────────────┬──────────────┬──────────────┐");
    println!("│ Counterparty     │ CVA          │ DVA          │ FVA          │ Total XVA    │");
    println!("├──────────────────┼──────────────┼──────────────┼──────────────┼──────────────┤");
    if output.xva.counterparties.is_empty() {
        println!("│ (no data)        │              │              │              │              │");
    }
    for cp in &output.xva.counterparties {
        println!(
            "│ {:<16} │ {:>12.2} │ {:>12.2} │ {:>12.2} │ {:>12.2} │",
            cp.counterparty_id.as_str(),
            cp.charges.cva,
            cp.charges.dva,
            cp.charges.fva(),
            cp.charges.total()
        );
    }
    println!("├──────────────────┼──────────────┼──────────────┼──────────────┼──────────────┤");
    println!(
        "│ {:<16} │ {:>12.2} │ {:>12.2} │ {:>12.2} │ {:>12.2} │",
        "Portfolio",
        output.xva.charges.cva,
        output.xva.charges.dva,
        output.xva.charges.fva(),
        output.xva.charges.total()
    );
    println!("└──────────────────┴──────────────┴──────────────┴──────────────┴──────────────┘");

    for profile in &output.netting_set_profiles {
        println!(
            "  {}: EPE_B {:.2}, EEPE_B {:.2}, peak PFE {:.2}",
            profile.id(),
            profile.epe_b(),
            profile.eepe_b(),
            profile.peak_pfe()
        );
    }
    if !output.valuation_report.is_empty() {
        println!(
            "  {} valuation error(s), see valuation_errors.csv",
            output.valuation_report.len()
        );
    }
    println!("  {} report file(s) written to {}", files.len(), dir.display());
}
