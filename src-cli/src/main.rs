//! canvasrec Command-Line Interface
//!
//! Drives the compositing recorder end to end: composites a live
//! source onto the canvas, records it, and exports the take as an
//! animated GIF. Ships with a synthetic pattern source; platform
//! capture backends plug in through the same `CaptureBackend` trait.

mod colors;
mod pattern;

use canvasrec_core::capture::SourceRequest;
use canvasrec_core::config;
use canvasrec_core::transcode;
use canvasrec_core::transform::TransformPatch;
use canvasrec_core::{
    CanvasGeometry, CaptureSession, SideEffect, ViewEvent, ViewState, ViewStateMachine,
};
use clap::{Parser, Subcommand};
use pattern::PatternBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Exit codes for scripting integration.
#[derive(Debug, Clone, Copy)]
enum ExitCode {
    Success = 0,
    GeneralError = 1,
    FfmpegMissing = 3,
    TranscodingFailed = 6,
}

/// canvasrec - composite, record, export
#[derive(Parser, Debug)]
#[command(name = "canvasrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record the composited canvas and export an animated GIF
    Record {
        /// Recording duration in seconds (Ctrl-C stops earlier)
        #[arg(long, default_value_t = 5.0)]
        duration: f64,

        /// Canvas sampling rate in frames per second
        #[arg(long, default_value_t = 30)]
        fps: u32,

        /// Canvas size as WIDTHxHEIGHT
        #[arg(long, default_value = "960x540", value_parser = parse_geometry)]
        canvas: CanvasGeometry,

        /// Destination x of the source's top-left corner
        #[arg(long, default_value_t = 0.0)]
        x: f64,

        /// Destination y of the source's top-left corner
        #[arg(long, default_value_t = 0.0)]
        y: f64,

        /// Scale relative to the source's native size
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Synthetic source size as WIDTHxHEIGHT
        #[arg(long, default_value = "640x360", value_parser = parse_geometry)]
        source_size: CanvasGeometry,

        /// Output GIF path (default: timestamped file in the
        /// configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify that the FFmpeg collaborator is available
    Doctor,
}

fn parse_geometry(s: &str) -> Result<CanvasGeometry, String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width: u32 = w.parse().map_err(|_| format!("invalid width '{}'", w))?;
    let height: u32 = h.parse().map_err(|_| format!("invalid height '{}'", h))?;
    Ok(CanvasGeometry::new(width, height))
}

#[tokio::main]
async fn main() {
    let _log_guard = canvasrec_core::logging::init_logging();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Record {
            duration,
            fps,
            canvas,
            x,
            y,
            scale,
            source_size,
            output,
        } => record(duration, fps, canvas, x, y, scale, source_size, output).await,
        Commands::Doctor => doctor().await,
    };
    std::process::exit(code as i32);
}

async fn doctor() -> ExitCode {
    match tokio::task::spawn_blocking(transcode::ensure_ffmpeg).await {
        Ok(Ok(())) => {
            println!("{}", colors::success("FFmpeg: OK"));
            ExitCode::Success
        }
        Ok(Err(e)) => {
            eprintln!("{}", colors::error(&e));
            ExitCode::FfmpegMissing
        }
        Err(e) => {
            eprintln!("{}", colors::error(&format!("task error: {}", e)));
            ExitCode::GeneralError
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn record(
    duration: f64,
    fps: u32,
    canvas: CanvasGeometry,
    x: f64,
    y: f64,
    scale: f64,
    source_size: CanvasGeometry,
    output: Option<PathBuf>,
) -> ExitCode {
    let output =
        output.unwrap_or_else(|| config::default_output_path(&config::load_config()));
    let mut view = ViewStateMachine::new();
    let transcoder_log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    // The transcoder must be loaded once before anything else runs.
    match tokio::task::spawn_blocking(transcode::ensure_ffmpeg).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::FfmpegMissing;
        }
        Err(e) => {
            eprintln!("{}", colors::error(&format!("task error: {}", e)));
            return ExitCode::GeneralError;
        }
    }
    view.fire(ViewEvent::TranscoderLoaded);

    let backend = Arc::new(PatternBackend::new(
        source_size.width,
        source_size.height,
        fps,
    ));
    let mut session = CaptureSession::new(backend, canvas);
    session
        .transform()
        .set(TransformPatch {
            x: Some(x),
            y: Some(y),
            scale: Some(scale),
        })
        .await;

    if let Err(e) = session.select_source(&SourceRequest::default()).await {
        eprintln!("{}", colors::error(&e.to_string()));
        return ExitCode::GeneralError;
    }
    if let Err(e) = session.start(fps).await {
        eprintln!("{}", colors::error(&e));
        return ExitCode::GeneralError;
    }

    info!("recording for up to {:.1}s at {} fps", duration, fps);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f64(duration.max(0.1))) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping early");
        }
    }

    session.stop().await;
    let effects = view.fire(ViewEvent::CaptureStopped);
    apply_effects(effects, &mut session, &transcoder_log).await;
    debug_assert_eq!(view.state(), ViewState::Captured);

    let recording = session.chunks().lock().await.to_bytes();
    if recording.is_empty() {
        eprintln!("{}", colors::error("no data was recorded"));
        return ExitCode::GeneralError;
    }
    info!("captured {} bytes", recording.len());

    // Stream transcoder log lines as they appear, keeping them for the
    // captured view until a restart clears them.
    let (log_tx, mut log_rx) = mpsc::unbounded_channel::<String>();
    let log_sink = transcoder_log.clone();
    let log_task = tokio::spawn(async move {
        while let Some(line) = log_rx.recv().await {
            eprintln!("{}", colors::detail(&line));
            log_sink.lock().await.push(line);
        }
    });

    let gif = match tokio::task::spawn_blocking(move || {
        transcode::transcode_to_gif(recording, fps, log_tx)
    })
    .await
    {
        Ok(Ok(gif)) => gif,
        Ok(Err(e)) => {
            // Transcode failure is recoverable: the take remains
            // captured and could be re-exported.
            eprintln!("{}", colors::error(&e));
            return ExitCode::TranscodingFailed;
        }
        Err(e) => {
            eprintln!("{}", colors::error(&format!("task error: {}", e)));
            return ExitCode::GeneralError;
        }
    };
    let _ = log_task.await;

    if let Err(e) = tokio::fs::write(&output, &gif).await {
        eprintln!(
            "{}",
            colors::error(&format!("failed to write {}: {}", output.display(), e))
        );
        return ExitCode::GeneralError;
    }

    let effects = view.fire(ViewEvent::TranscodeComplete);
    apply_effects(effects, &mut session, &transcoder_log).await;
    debug_assert_eq!(view.state(), ViewState::Converted);

    println!(
        "{}",
        colors::success(&format!(
            "Wrote {} ({} bytes)",
            output.display(),
            gif.len()
        ))
    );
    ExitCode::Success
}

/// Execute the side effects of a view transition.
async fn apply_effects(
    effects: &[SideEffect],
    session: &mut CaptureSession,
    transcoder_log: &Arc<Mutex<Vec<String>>>,
) {
    for effect in effects {
        match effect {
            SideEffect::StopTracks => session.stop().await,
            SideEffect::ClearChunks => session.chunks().lock().await.clear(),
            SideEffect::ClearLog => transcoder_log.lock().await.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvasrec_core::ViewEvent;

    fn captured_session() -> CaptureSession {
        let backend = Arc::new(PatternBackend::new(8, 8, 30));
        CaptureSession::new(backend, CanvasGeometry::new(32, 32))
    }

    #[tokio::test]
    async fn restart_effects_empty_the_chunk_buffer_and_log() {
        let mut session = captured_session();
        session.chunks().lock().await.append(vec![1, 2, 3]);
        let log: Arc<Mutex<Vec<String>>> =
            Arc::new(Mutex::new(vec!["frame=1".to_string()]));

        let mut view = ViewStateMachine::new();
        view.fire(ViewEvent::TranscoderLoaded);
        view.fire(ViewEvent::CaptureStopped);

        let effects = view.fire(ViewEvent::Restart);
        apply_effects(effects, &mut session, &log).await;

        assert_eq!(view.state(), ViewState::Ready);
        assert!(session.chunks().lock().await.is_empty());
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn transcode_complete_effects_empty_the_chunk_buffer() {
        let mut session = captured_session();
        session.chunks().lock().await.append(vec![4, 5]);
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut view = ViewStateMachine::new();
        view.fire(ViewEvent::TranscoderLoaded);
        view.fire(ViewEvent::CaptureStopped);

        let effects = view.fire(ViewEvent::TranscodeComplete);
        apply_effects(effects, &mut session, &log).await;

        assert_eq!(view.state(), ViewState::Converted);
        assert!(session.chunks().lock().await.is_empty());
    }
}
