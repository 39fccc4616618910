use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use meshtiler::{CliArgs, Pipeline, PipelineConfig};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("meshtiler=debug")
    } else {
        EnvFilter::new("meshtiler=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: PipelineConfig = args.into();

    if let Some(threads) = config.tiling.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to size the worker pool")?;
    }

    match Pipeline::run(&config) {
        Ok(result) => {
            for failure in &result.failures {
                eprintln!("warning: {failure}");
            }
            println!(
                "done: {} tiles in {:.2}s",
                result.tile_count,
                result.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            error!(%e, "pipeline failed");
            Err(anyhow::Error::new(e).context("meshtiler pipeline failed"))
        }
    }
}
