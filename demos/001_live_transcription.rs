//! Live transcription of a raw audio file.
//!
//! Demonstrates:
//! - Building options from the environment (`VOXSTREAM_API_KEY`)
//! - Channel consumption with a draining task per event type
//! - Streaming a file, then a graceful stop
//!
//! Usage:
//!   cargo run --example 001_live_transcription -- speech.raw
//!   cargo run --example 001_live_transcription -- speech.raw --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, bail};
use common::Args;
use voxstream::ClientOptions;
use voxstream::listen::{ListenChannelHub, ListenClient, ListenOptions};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== 001: Live Transcription ===\n");

    let Some(path) = args.audio else {
        bail!("usage: 001_live_transcription <file.raw> [--debug]");
    };

    let options = ClientOptions::builder()
        .keep_alive(true)
        .auto_flush_reply_delta(Duration::from_millis(1500))
        .verbosity(common::verbosity(args.debug))
        .build()?;
    let listen = ListenOptions::new()
        .with_model("nova-3")
        .with_encoding("linear16", 16_000)
        .with_interim_results()
        .with_punctuate();

    let (hub, rx) = ListenChannelHub::new(64);
    let (mut results_rx, mut error_rx) = (rx.results, rx.error);
    let client = ListenClient::with_channels(options, listen, &[&hub]);

    // ========================================================================
    // Consumers
    // ========================================================================

    let results = tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            let marker = if result.is_final { "final" } else { "interim" };
            if !result.transcript().is_empty() {
                println!("    [{marker}] {}", result.transcript());
            }
        }
    });
    let errors = tokio::spawn(async move {
        while let Some(error) = error_rx.recv().await {
            eprintln!("    [error] {} {}", error.err_code, error.description);
        }
    });

    // ========================================================================
    // Stream
    // ========================================================================

    println!("[1] Connecting...");
    if !client.connect().await? {
        bail!("could not connect");
    }
    println!("    ✓ Connected\n");

    println!("[2] Streaming {}...", path.display());
    let audio = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    client.stream(audio).await?;
    client.finalize().await?;
    println!("    ✓ Audio sent\n");

    tokio::time::sleep(Duration::from_secs(2)).await;
    client.stop().await;
    results.abort();
    errors.abort();
    println!("\n=== Done ===");
    Ok(())
}
