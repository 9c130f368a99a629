//! Built-in synthetic capture backend.
//!
//! Produces a moving diagonal gradient at a fixed frame rate. Used to
//! exercise the full compositing and recording pipeline without a
//! platform capture backend; real backends implement the same
//! `CaptureBackend` trait.

use canvasrec_core::capture::{
    CaptureBackend, CaptureError, SourceFrame, SourceRequest, SourceStream, StopHandle,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Backend producing synthetic frames.
pub struct PatternBackend {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl PatternBackend {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate: frame_rate.max(1),
        }
    }
}

impl CaptureBackend for PatternBackend {
    fn acquire(&self, request: &SourceRequest) -> Result<SourceStream, CaptureError> {
        if request.with_audio {
            return Err(CaptureError::Unsupported(
                "pattern source has no audio tracks".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(8);
        let stop: StopHandle = Arc::new(AtomicBool::new(false));

        let producer_stop = stop.clone();
        let (width, height) = (self.width, self.height);
        let interval = Duration::from_secs_f64(1.0 / self.frame_rate as f64);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut tick: u32 = 0;
            // Honors the stop handle: ends the loop and drops the
            // sender, which is what consumers observe as completion.
            while !producer_stop.load(Ordering::SeqCst) {
                ticker.tick().await;
                let frame = SourceFrame::new(width, height, gradient_pixels(width, height, tick));
                if tx.send(frame).await.is_err() {
                    break;
                }
                tick = tick.wrapping_add(1);
            }
        });

        Ok(SourceStream::new(rx, stop))
    }
}

/// Diagonal gradient shifted by `tick`, BGRA.
fn gradient_pixels(width: u32, height: u32, tick: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = (x + y + tick * 4) as u8;
            data.extend_from_slice(&[v, v.wrapping_add(85), v.wrapping_add(170), 0xff]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_frames_until_tracks_stop() {
        let backend = PatternBackend::new(32, 32, 60);
        let mut source = backend.acquire(&SourceRequest::default()).unwrap();

        let frame = source.next_frame().await.unwrap();
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.data().len(), 32 * 32 * 4);
        frame.close();

        source.stop_tracks();
        // Drain until the producer observes the flag and drops out.
        while source.next_frame().await.is_some() {}
    }

    #[tokio::test]
    async fn rejects_audio_requests() {
        let backend = PatternBackend::new(32, 32, 30);
        let request = SourceRequest {
            with_audio: true,
            ..Default::default()
        };
        assert!(backend.acquire(&request).is_err());
    }
}
