//! The frame compositing loop.
//!
//! Continuously transfers frames from a live source onto the canvas
//! under the current transform. Awaiting the next frame is the loop's
//! sole suspension point; the loop ends when the source reports
//! completion, which is also how session teardown cancels it (stopping
//! the source's tracks makes the next read return `None`).

use crate::capture::SourceStream;
use crate::surface::SharedSurface;
use crate::transform::TransformCell;
use tracing::debug;

/// Drain `source` into `surface`, drawing every frame in arrival order.
///
/// Each iteration clears the canvas, draws the frame scaled and
/// positioned by the current transform, and releases the frame's
/// underlying resource before requesting the next one. No frame is
/// drawn twice and none is skipped. Exhaustion is expected termination,
/// not an error.
pub async fn composite_frames(
    mut source: SourceStream,
    surface: SharedSurface,
    transform: TransformCell,
) {
    let mut frames_drawn: u64 = 0;
    while let Some(frame) = source.next_frame().await {
        let current = transform.get().await;
        {
            let mut canvas = surface.lock().await;
            canvas.clear();
            canvas.draw_frame(&frame, &current);
        }
        frame.close();
        frames_drawn += 1;
    }
    debug!("compositor loop ended after {} frames", frames_drawn);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SourceFrame, StopHandle};
    use crate::surface::{CanvasGeometry, CanvasSurface};
    use crate::transform::Transform;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn tracked_frame(index: u8, release_tx: &mpsc::UnboundedSender<u8>) -> SourceFrame {
        let release_tx = release_tx.clone();
        // Frame pixels carry the index so the final draw is observable.
        SourceFrame::with_release_hook(
            2,
            2,
            vec![index; 16],
            Box::new(move || {
                let _ = release_tx.send(index);
            }),
        )
    }

    #[tokio::test]
    async fn draws_three_frames_in_order_and_releases_each_before_the_next() {
        let (tx, rx) = mpsc::channel(1);
        let stop: StopHandle = Arc::new(AtomicBool::new(false));
        let source = SourceStream::new(rx, stop);
        let surface = CanvasSurface::shared(CanvasGeometry::new(16, 16));
        let transform = TransformCell::new(Transform::default());

        let (release_tx, mut release_rx) = mpsc::unbounded_channel();

        // The producer only sends frame N+1 after frame N's release
        // hook has fired, so loop completion proves each frame was
        // released before the next one was requested and drawn.
        let producer = tokio::spawn(async move {
            let mut released = Vec::new();
            for index in 1..=3u8 {
                tx.send(tracked_frame(index, &release_tx)).await.unwrap();
                released.push(release_rx.recv().await.unwrap());
            }
            released
        });

        composite_frames(source, surface.clone(), transform).await;

        let released = producer.await.unwrap();
        assert_eq!(released, vec![1, 2, 3]);
        // The last frame's pixels are what remains on the canvas.
        let canvas = surface.lock().await;
        assert_eq!(&canvas.pixels()[0..4], &[3, 3, 3, 3]);
    }

    #[tokio::test]
    async fn track_teardown_ends_the_loop_without_explicit_cancel() {
        let (tx, rx) = mpsc::channel(4);
        let stop: StopHandle = Arc::new(AtomicBool::new(false));
        let source = SourceStream::new(rx, stop.clone());
        let surface = CanvasSurface::shared(CanvasGeometry::new(16, 16));
        let transform = TransformCell::new(Transform::default());

        // Producer that honors the stop handle, like a real backend.
        let producer_stop = stop.clone();
        let producer = tokio::spawn(async move {
            while !producer_stop.load(Ordering::SeqCst) {
                if tx.send(SourceFrame::new(2, 2, vec![1; 16])).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            // Dropping the sender is the teardown the consumer observes.
        });

        let compositor = tokio::spawn(composite_frames(source, surface, transform));
        tokio::time::sleep(Duration::from_millis(10)).await;

        stop.store(true, Ordering::SeqCst);
        producer.await.unwrap();
        // The loop exits on its own once the tracks are gone.
        tokio::time::timeout(Duration::from_secs(1), compositor)
            .await
            .expect("compositor did not end after track teardown")
            .unwrap();
    }
}
