//! Animated GIF transcoding via FFmpeg.
//!
//! The transcoder is an external collaborator: it takes the single
//! concatenated recording blob and a target frame rate, streams log
//! lines while it works, and returns the finished GIF bytes. It must
//! be initialized once (binary resolution and verification) before
//! first use; that completion is what moves the view out of `init`.

use ffmpeg_sidecar::command::FfmpegCommand;
use once_cell::sync::OnceCell;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tokio::sync::mpsc;
use tracing::{info, warn};

static FFMPEG_PATH: OnceCell<PathBuf> = OnceCell::new();

/// GIF output frame rates accepted by the palette filter chain.
pub const MIN_GIF_FRAME_RATE: u32 = 1;
pub const MAX_GIF_FRAME_RATE: u32 = 50;

fn locate_ffmpeg() -> PathBuf {
    // Prefer a system FFmpeg from PATH, then the sidecar location next
    // to the executable.
    if let Ok(path) = which::which("ffmpeg") {
        return path;
    }
    ffmpeg_sidecar::paths::ffmpeg_path()
}

/// Path used by encoding/transcoding commands. Falls back to plain
/// resolution when `ensure_ffmpeg` has not run yet.
pub(crate) fn resolve_ffmpeg_path() -> PathBuf {
    FFMPEG_PATH.get().cloned().unwrap_or_else(locate_ffmpeg)
}

/// Resolve and verify the FFmpeg binary. Idempotent; the result is
/// cached for the lifetime of the process.
pub fn ensure_ffmpeg() -> Result<(), String> {
    FFMPEG_PATH
        .get_or_try_init(|| {
            let ffmpeg = locate_ffmpeg();
            match Command::new(&ffmpeg)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) if status.success() => {
                    info!("FFmpeg verified at {}", ffmpeg.display());
                    Ok(ffmpeg)
                }
                Ok(status) => Err(format!(
                    "FFmpeg binary at {} exited with status: {}",
                    ffmpeg.display(),
                    status
                )),
                Err(e) => {
                    warn!("FFmpeg not found at {}: {}", ffmpeg.display(), e);
                    // Auto-download as a last resort on Linux, matching
                    // the packaging story (system package elsewhere).
                    #[cfg(target_os = "linux")]
                    {
                        ffmpeg_sidecar::download::auto_download().map_err(|e| {
                            format!("FFmpeg not found and auto-download failed: {}", e)
                        })?;
                        Ok(ffmpeg_sidecar::paths::ffmpeg_path())
                    }
                    #[cfg(not(target_os = "linux"))]
                    {
                        Err(format!("FFmpeg not found at {}: {}", ffmpeg.display(), e))
                    }
                }
            }
        })
        .map(|_| ())
}

/// Transcode a concatenated Matroska recording into an animated GIF.
///
/// Blocking; call from `spawn_blocking` in async contexts. Log lines
/// from the encoder are forwarded over `log_tx` as they appear. A
/// palette is generated from the recording so the 256-color output
/// stays faithful to the source.
pub fn transcode_to_gif(
    recording: Vec<u8>,
    frame_rate: u32,
    log_tx: mpsc::UnboundedSender<String>,
) -> Result<Vec<u8>, String> {
    if recording.is_empty() {
        return Err("Nothing to transcode: the recording is empty".to_string());
    }
    ensure_ffmpeg()?;
    let frame_rate = frame_rate.clamp(MIN_GIF_FRAME_RATE, MAX_GIF_FRAME_RATE);

    let mut command = FfmpegCommand::new_with_path(resolve_ffmpeg_path());
    command
        // Input: the concatenated recording from stdin
        .args(["-f", "matroska"])
        .args(["-i", "-"])
        // Palette-based GIF for acceptable quality
        .args([
            "-vf",
            &format!(
                "fps={},split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
                frame_rate
            ),
        ])
        .args(["-f", "gif"])
        .arg("-");

    let inner = command.as_inner_mut();
    inner.stdin(Stdio::piped());
    inner.stdout(Stdio::piped());
    inner.stderr(Stdio::piped());

    let mut child = inner
        .spawn()
        .map_err(|e| format!("Failed to start FFmpeg for transcoding: {}", e))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or("Failed to get FFmpeg stdin")?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or("Failed to get FFmpeg stdout")?;

    // Feed the recording from a separate thread so a full stdout pipe
    // cannot deadlock against a full stdin pipe.
    let writer = std::thread::spawn(move || {
        let _ = stdin.write_all(&recording);
        // Dropping stdin signals end of input.
    });

    // Forward stderr lines to the log sink, keeping the tail for error
    // reporting.
    let stderr_lines = child.stderr.take().map(|stderr| {
        std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            let mut last = String::new();
            for line in reader.lines().map_while(Result::ok) {
                let _ = log_tx.send(line.clone());
                last = line;
            }
            last
        })
    });

    let mut gif = Vec::new();
    stdout
        .read_to_end(&mut gif)
        .map_err(|e| format!("Failed to read FFmpeg output: {}", e))?;

    let _ = writer.join();
    let last_log = stderr_lines
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    let status = child
        .wait()
        .map_err(|e| format!("FFmpeg transcoding process error: {}", e))?;
    if !status.success() {
        let detail = if last_log.is_empty() {
            format!("exit code: {:?}", status.code())
        } else {
            last_log
        };
        return Err(format!("FFmpeg transcoding failed: {}", detail));
    }

    info!("Transcoded {} bytes of GIF output", gif.len());
    Ok(gif)
}
