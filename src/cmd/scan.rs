//! QR reception: `qstrack scan`.
//!
//! Payloads come from the command line, from stdin (one decoded QR text per
//! line) or from an external decoder process reading the camera.

use anyhow::{Context as _, Result, bail};
use futures::stream::{self, BoxStream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use qstrack::scanner::{
    DecoderProcess, MediaBackend, PartImage, ScanEvent, ScanOutcome, ScanResolver, StreamGuard,
    discover_cameras, scan_loop,
};
use qstrack::ui::icons::{IMAGE, SCAN};
use qstrack::ui::render;
use qstrack::view::{Notice, ViewScope};

use super::Context;

/// Where decoded payloads come from.
pub enum ScanSource {
    Args(Vec<String>),
    Stdin,
    Decoder(String),
}

fn stdin_lines() -> BoxStream<'static, String> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    Box::pin(stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "stdin unreadable");
                None
            }
        }
    }))
}

pub async fn cmd_list_cameras(decoder: &str) -> Result<()> {
    let backend = DecoderProcess::from_command_line(decoder)?;
    let cameras = discover_cameras(&backend)
        .await
        .context("Camera discovery failed")?;
    for camera in cameras {
        println!("{}{}  {}", SCAN, camera.label, camera.id);
    }
    Ok(())
}

pub async fn cmd_scan(ctx: &Context, scope: &ViewScope, source: ScanSource) -> Result<()> {
    let scanner = &ctx.config.toml.scanner;
    let resolver = ScanResolver::new(ctx.directory.clone())
        .with_cooldown(ctx.config.scan_cooldown())
        .with_recent_limit(scanner.recent_limit)
        .with_history_days(scanner.history_days);

    match scope.run(resolver.seed_recent(&ctx.session)).await {
        Some(Ok(_)) => {}
        Some(Err(err)) => warn!(error = %err, "could not load recent scans"),
        None => bail!("Interrupted"),
    }

    // Held until the loop ends so the decoder is stopped on every exit path.
    let mut guard = None;
    let payloads: BoxStream<'static, String> = match source {
        ScanSource::Args(payloads) => Box::pin(stream::iter(payloads)),
        ScanSource::Stdin => stdin_lines(),
        ScanSource::Decoder(command) => {
            let backend = DecoderProcess::from_command_line(&command)?;
            let mut stream = StreamGuard::new(backend.open_stream().await?);
            let payloads = stream
                .payloads()
                .context("Decoder produced no output stream")?;
            guard = Some(stream);
            println!("{}Scanning with {}, Ctrl-C to stop", SCAN, command);
            payloads
        }
    };

    let mut failed = 0usize;
    let processed = scan_loop(&resolver, &ctx.session, payloads, scope, |event| {
        if event.result.is_err() {
            failed += 1;
        }
        report(&event);
    })
    .await;
    drop(guard);

    println!();
    print!("{}", render::recent_scans(&resolver.recent()));

    if failed > 0 {
        bail!("{} of {} scans failed", failed, processed);
    }
    Ok(())
}

fn report(event: &ScanEvent) {
    if let Some(notice) = Notice::from_scan(&event.result) {
        println!("{}", render::notice(&notice));
    }
    if let Ok(ScanOutcome::Received(receipt)) = &event.result {
        match &receipt.image {
            PartImage::Loaded { path, bytes } => {
                println!("  {}{} ({} bytes)", IMAGE, path, bytes.len());
            }
            PartImage::Placeholder => {
                println!("  {}no image", IMAGE);
            }
        }
        if !receipt.logged {
            println!("  {}", console::style("Not added to the scan log").yellow());
        }
    }
}
