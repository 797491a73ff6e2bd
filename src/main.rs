use anyhow::Result;
use clap::Parser;

use turngraph::cli::{run_expand, run_info, Cli, Commands};

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Expand {
            graph,
            outdir,
            profile,
            segment_lookup,
        } => run_expand(graph, outdir, profile, segment_lookup),
        Commands::Info { graph } => run_info(graph),
    }
}

/// Structured logging; respects RUST_LOG for filtering.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
