//! Canvas recording via FFmpeg.
//!
//! The recorder derives a media stream from the canvas by sampling it
//! at a fixed frame rate and piping raw BGRA frames into an FFmpeg
//! child process. FFmpeg emits H.264 in a streamable Matroska container
//! on stdout, which a reader thread forwards as discrete chunks in
//! arrival order. Concatenating the chunks reproduces the encoder's
//! output byte-for-byte.

use crate::surface::{CanvasGeometry, SharedSurface};
use crate::transcode::resolve_ffmpeg_path;
use ffmpeg_sidecar::command::FfmpegCommand;
use std::io::{Read, Write};
use std::process::{ChildStdin, Stdio};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::capture::StopHandle;

/// Read size for the stdout chunk forwarder.
const CHUNK_READ_BYTES: usize = 64 * 1024;

/// Accepted sampling frame rates.
pub const MIN_FRAME_RATE: u32 = 1;
pub const MAX_FRAME_RATE: u32 = 120;

/// Encoder process that turns sampled canvas frames into chunks.
pub struct ChunkRecorder {
    stdin: Option<ChildStdin>,
    child: Option<std::process::Child>,
    stdout_reader: Option<std::thread::JoinHandle<()>>,
    width: u32,
    height: u32,
}

impl ChunkRecorder {
    /// Spawn the encoder for the given canvas geometry and frame rate.
    ///
    /// Emitted chunks are sent over `chunk_tx`; the channel closes once
    /// the encoder has flushed its final chunk. Construction fails if
    /// FFmpeg cannot be spawned or the geometry collapses to zero.
    pub fn start(
        geometry: CanvasGeometry,
        frame_rate: u32,
        chunk_tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<Self, String> {
        let frame_rate = frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);

        // Round down to even dimensions for codec compatibility.
        let width = geometry.width & !1;
        let height = geometry.height & !1;
        if width == 0 || height == 0 {
            return Err(format!(
                "Invalid recording dimensions: {}x{}",
                width, height
            ));
        }

        let mut command = FfmpegCommand::new_with_path(resolve_ffmpeg_path());
        command
            // Input: raw canvas frames from stdin
            .args(["-f", "rawvideo"])
            .args(["-pix_fmt", "bgra"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &frame_rate.to_string()])
            .args(["-i", "-"])
            // Output: H.264 in a streamable Matroska container on stdout
            .args(["-c:v", "libx264"])
            .args(["-preset", "ultrafast"])
            .args(["-crf", "23"])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-f", "matroska"])
            .arg("-");

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::piped());
        inner.stdout(Stdio::piped());
        inner.stderr(Stdio::piped());

        let mut child = inner
            .spawn()
            .map_err(|e| format!("Failed to start FFmpeg: {}", e))?;

        let stdin = child.stdin.take().ok_or("Failed to get FFmpeg stdin")?;
        let stdout = child.stdout.take().ok_or("Failed to get FFmpeg stdout")?;

        // Forward encoder output as chunks, preserving arrival order.
        // The sender is dropped on EOF, which closes the chunk channel
        // after the final chunk.
        let stdout_reader = std::thread::spawn(move || {
            let mut stdout = stdout;
            let mut buf = vec![0u8; CHUNK_READ_BYTES];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if chunk_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("FFmpeg stdout read failed: {}", e);
                        break;
                    }
                }
            }
        });

        if let Some(stderr) = child.stderr.take() {
            std::thread::spawn(move || {
                use std::io::{BufRead, BufReader};
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    debug!("[ffmpeg] {}", line);
                }
            });
        }

        Ok(Self {
            stdin: Some(stdin),
            child: Some(child),
            stdout_reader: Some(stdout_reader),
            width,
            height,
        })
    }

    /// Write one sampled canvas frame to the encoder.
    ///
    /// Snapshots may be slightly larger than the encoder dimensions
    /// because of even-dimension rounding; oversized rows are cropped.
    pub fn write_frame(&mut self, data: &[u8], src_width: u32, src_height: u32) -> Result<(), String> {
        if src_width < self.width || src_height < self.height {
            debug!(
                "Skipping frame: {}x{} smaller than encoder {}x{}",
                src_width, src_height, self.width, self.height
            );
            return Ok(());
        }

        let stdin = match self.stdin.as_mut() {
            Some(stdin) => stdin,
            None => return Ok(()),
        };

        if src_width == self.width && src_height == self.height {
            stdin
                .write_all(data)
                .map_err(|e| format!("Failed to write frame: {}", e))?;
        } else {
            let src_row_bytes = (src_width * 4) as usize;
            let dst_row_bytes = (self.width * 4) as usize;
            for y in 0..self.height as usize {
                let start = y * src_row_bytes;
                let end = start + dst_row_bytes;
                if end <= data.len() {
                    stdin
                        .write_all(&data[start..end])
                        .map_err(|e| format!("Failed to write frame row: {}", e))?;
                }
            }
        }
        Ok(())
    }

    /// Close the encoder's input and wait for the final chunk to be
    /// delivered. Returns once the chunk channel has closed.
    pub fn finish(mut self) -> Result<(), String> {
        drop(self.stdin.take());

        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| format!("FFmpeg process error: {}", e))?;
            if !status.success() {
                return Err(format!(
                    "FFmpeg encoding failed with exit code: {:?}",
                    status.code()
                ));
            }
        }

        // Join the stdout forwarder so every chunk, including the final
        // one produced by stream teardown, is on the channel before we
        // report completion.
        if let Some(reader) = self.stdout_reader.take() {
            let _ = reader.join();
        }
        Ok(())
    }
}

impl Drop for ChunkRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Sampling loop: snapshot the canvas at `frame_rate` and feed the
/// recorder until the stop flag is set, then flush the encoder.
///
/// This is the surface-to-stream bridge; its lifetime is bounded by the
/// session that spawned it.
pub async fn drive_recorder(
    surface: SharedSurface,
    frame_rate: u32,
    stop: StopHandle,
    mut recorder: ChunkRecorder,
) -> Result<(), String> {
    let frame_rate = frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / frame_rate as f64));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut frames_written: u64 = 0;
    while !stop.load(Ordering::SeqCst) {
        ticker.tick().await;
        let (snapshot, geometry) = {
            let canvas = surface.lock().await;
            (canvas.snapshot(), canvas.geometry())
        };
        recorder.write_frame(&snapshot, geometry.width, geometry.height)?;
        frames_written += 1;
    }

    debug!("recorder sampled {} frames", frames_written);
    tokio::task::spawn_blocking(move || recorder.finish())
        .await
        .map_err(|e| format!("Recorder finish task error: {}", e))?
}
