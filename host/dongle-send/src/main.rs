mod args;
mod find_tty;
mod loopback;
mod tty;

use crate::args::Args;
use crate::loopback::Loopback;
use crate::tty::Tty;
use clap::Parser;
use dongle_common::{
    plan_chunks, send_with_progress, ChunkOutcome, SendConfig, SendReport, Transport,
};
use eyre::{eyre, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::Path;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt::Subscriber::builder()
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish()
        .init();

    let payload = read_payload(&args)?;
    tracing::info!("payload size: {} bytes", payload.len());

    let config = args.send_config();
    let report = if args.dry_run {
        let mut loopback = Loopback::new();
        let report = run(&args, &mut loopback, &payload, &config)?;
        tracing::info!(
            "[loopback] {} frame(s), {} complete message(s)",
            loopback.frames(),
            loopback.messages().len()
        );
        report
    } else {
        let device = match &args.device {
            Some(device) => device.clone(),
            None => {
                tracing::warn!("no device specified, searching for suitable TTY");
                let device = find_tty::find_most_recent_tty().ok_or_else(|| {
                    eyre!(
                        "failed to find suitable TTY device, expected device in /dev like one of: {}",
                        find_tty::PATTERNS
                            .iter()
                            .map(|p| format!("{p}*"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?;
                tracing::info!("using device {}", device.display());
                device
            }
        };
        let mut tty = Tty::new(&device, args.baud)?;
        tty.set_timeout(args.timeout());
        run(&args, &mut tty, &payload, &config)
            .wrap_err_with(|| eyre!("failed to send to {}", tty.path().display()))?
    };

    summarize(&report);
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(args: &Args) -> eyre::Result<Vec<u8>> {
    if let Some(text) = &args.text {
        return Ok(text.clone().into_bytes());
    }
    let input = args
        .input
        .as_deref()
        .ok_or_else(|| eyre!("no payload given"))?;
    if input == Path::new("-") {
        let mut payload = vec![];
        std::io::stdin()
            .read_to_end(&mut payload)
            .wrap_err("failed to read payload from stdin")?;
        Ok(payload)
    } else {
        std::fs::read(input).wrap_err_with(|| eyre!("failed to read {}", input.display()))
    }
}

fn run<T: Transport>(
    args: &Args,
    transport: &mut T,
    payload: &[u8],
    config: &SendConfig,
) -> eyre::Result<SendReport> {
    let plan = plan_chunks(payload.len(), config)?;

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(u64::from(plan.count()))
    };
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:60.cyan/blue} [{pos}/{len} chunks] {msg}",
    )?);

    let report = send_with_progress(transport, args.instruction, payload, config, |chunk| {
        pb.inc(1);
        if let ChunkOutcome::Failed(e) = &chunk.outcome {
            pb.set_message(format!("chunk {} failed: {e}", chunk.index));
        }
    })?;
    pb.finish_and_clear();
    Ok(report)
}

fn summarize(report: &SendReport) {
    for chunk in &report.chunks {
        match &chunk.outcome {
            ChunkOutcome::Delivered { response } if !response.is_empty() => {
                tracing::debug!(
                    "chunk {}/{}: response {}",
                    chunk.index,
                    chunk.count,
                    hex::encode(response)
                );
            }
            ChunkOutcome::Delivered { .. } | ChunkOutcome::Failed(_) => {}
            ChunkOutcome::Skipped => {
                tracing::warn!("chunk {}/{}: skipped", chunk.index, chunk.count);
            }
        }
    }
    if report.is_success() {
        tracing::info!(
            "sent {} bytes as {} chunk(s) with instruction {:#04x}",
            report.payload_len,
            report.len(),
            report.instruction
        );
    } else {
        tracing::error!(
            "delivered {}/{} chunk(s) with instruction {:#04x}",
            report.delivered(),
            report.len(),
            report.instruction
        );
    }
}
