use clap::Parser;
use tracing_subscriber::EnvFilter;

use ocarina::cli::{run_cli_command, Cli};

fn init_tracing(debug: bool) {
    let default = if debug { "ocarina=debug" } else { "ocarina=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.debug);

    // One invocation is one sequence of awaited calls.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Err(err) = runtime.block_on(run_cli_command(cli)) {
        tracing::debug!(category = %err.category(), "command failed");
        eprintln!("Error: {}", err);
        eprintln!("  {}", err.recovery_hint());
        std::process::exit(err.exit_code());
    }

    Ok(())
}
