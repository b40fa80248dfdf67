use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use sharedstack_catalog::{read_catalog_snapshot, write_catalog_snapshot, RemoteCatalog};
use sharedstack_core::StackConfig;
use sharedstack_installer::{
    run_pass, CommandRunner, EupsTooling, PassContext, PassReport, RunState, StackLayout,
};

mod render;

use render::{format_pass_report, TerminalRenderer};

/// Overrides the default `info` log filter.
const LOG_ENV_VAR: &str = "SHARED_STACK_LOG";

#[derive(Parser, Debug)]
#[command(name = "shared-stack")]
#[command(
    about = "Keep a shared software stack in step with the published tag catalog",
    long_about = None
)]
struct Cli {
    /// Print every mutating command instead of running it.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let report = run(&cli)?;
    Ok(ExitCode::from(exit_status(&report)))
}

fn init_tracing() {
    let filter = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| "info".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: &Cli) -> Result<PassReport> {
    let config = StackConfig::discover()?;
    let layout = StackLayout::from_config(&config);
    let renderer = TerminalRenderer::current();

    // Dry-run keeps its scratch space out of the stack root.
    let state_base = if cli.dry_run {
        std::env::temp_dir().join("shared-stack")
    } else {
        layout.ensure_base_dirs()?;
        layout.state_dir()
    };
    let run_state = RunState::create(&state_base)?;

    let catalog = RemoteCatalog::from_config(&config)?;
    let spinner = renderer.start_spinner("fetching tag catalog");
    let fetched = catalog.fetch();
    spinner.finish();
    write_catalog_snapshot(&run_state.catalog_path(), &fetched?)?;
    let fetched = read_catalog_snapshot(&run_state.catalog_path())?.tags()?;

    let tooling = EupsTooling::new(
        &config,
        CommandRunner::new(cli.dry_run),
        catalog,
        run_state.eups_userdata_dir(),
    );
    let ctx = PassContext {
        config: &config,
        layout: &layout,
        tooling: &tooling,
        dry_run: cli.dry_run,
    };
    let report = run_pass(&ctx, &fetched)?;

    renderer.print_lines(&format_pass_report(&report, renderer.style()));
    Ok(report)
}

fn exit_status(report: &PassReport) -> u8 {
    u8::from(report.has_failures())
}
