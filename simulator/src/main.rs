use anyhow::Context;
use clap::Parser;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Host driver for the montage derivation core")]
struct Args {
    /// Derive from a fully written recording
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Stream the recording into the buffers while polling the engine
    #[arg(long, default_value_t = false)]
    live: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Samples published per producer tick in live mode
    #[arg(long)]
    chunk: Option<usize>,
    /// Write the run summary as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn print_summary(result: &WorkflowResult) {
    println!(
        "{} run -> montage {}, channels {}, dropped {}, not-ready retries {}",
        result.mode,
        result.montage,
        result.channels.len(),
        result.dropped,
        result.not_ready_retries
    );
    for channel in &result.channels {
        println!(
            "  channel {:>3}: {} samples, rms {:.4}",
            channel.channel, channel.samples, channel.rms
        );
    }
}

fn write_report(path: &Path, results: &[WorkflowResult]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(results).context("serializing run report")?;
    fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::default()
    };
    let chunk = args.chunk.unwrap_or(workflow_config.live.chunk);
    let runner = Runner::new(workflow_config);

    let mut results = Vec::new();
    if args.offline || !args.live {
        let result = runner.execute_offline()?;
        print_summary(&result);
        results.push(result);
    }
    if args.live {
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for live mode")?;
        let result = runtime.block_on(async {
            tokio::select! {
                result = runner.execute_live(chunk) => result.map(Some),
                interrupted = signal::ctrl_c() => {
                    interrupted.context("awaiting Ctrl+C")?;
                    warn!("live run interrupted");
                    Ok(None)
                }
            }
        })?;
        if let Some(result) = result {
            print_summary(&result);
            results.push(result);
        }
    }

    if let Some(path) = args.report {
        write_report(&path, &results)?;
    }
    Ok(())
}
