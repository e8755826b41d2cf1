//! Bounded frame extraction.
//!
//! A dedicated worker thread owns the clip handle; extraction requests are
//! serialized through it and answered over per-request channels so a caller
//! can give up after the configured timeout without abandoning the clip.

use crate::{Frame, Result, VideoClip};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

enum Request {
    FrameAt {
        position_ms: u64,
        reply: mpsc::SyncSender<Result<Frame>>,
    },
}

#[derive(Clone)]
pub(crate) struct ClipHandle {
    tx: mpsc::Sender<Request>,
    duration_ms: u64,
    supports_rate: bool,
}

impl ClipHandle {
    pub fn spawn(clip: Box<dyn VideoClip>) -> Self {
        let duration_ms = clip.duration_ms();
        let supports_rate = clip.supports_rate();
        let (tx, rx) = mpsc::channel::<Request>();
        let builder = thread::Builder::new().name("feed-extract".into());
        if let Err(e) = builder.spawn(move || worker(clip, rx)) {
            warn!("failed to spawn extraction worker: {e}");
        }
        Self {
            tx,
            duration_ms,
            supports_rate,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn supports_rate(&self) -> bool {
        self.supports_rate
    }

    /// Extract the frame nearest `position_ms`, waiting at most `timeout`.
    pub fn frame_at(&self, position_ms: u64, timeout: Duration) -> Option<Frame> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let request = Request::FrameAt {
            position_ms,
            reply: reply_tx,
        };
        if self.tx.send(request).is_err() {
            warn!("extraction worker is gone");
            return None;
        }
        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(frame)) => Some(frame),
            Ok(Err(e)) => {
                warn!(position_ms, "frame extraction failed: {e}");
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(position_ms, timeout_ms = timeout.as_millis() as u64, "frame extraction timed out");
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn worker(mut clip: Box<dyn VideoClip>, rx: mpsc::Receiver<Request>) {
    while let Ok(request) = rx.recv() {
        match request {
            Request::FrameAt { position_ms, reply } => {
                // The caller may have timed out already; a failed send
                // just means nobody is waiting anymore.
                let _ = reply.send(clip.frame_at(position_ms));
            }
        }
    }
    debug!("extraction worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    struct InstantClip;

    impl VideoClip for InstantClip {
        fn duration_ms(&self) -> u64 {
            5000
        }

        fn frame_at(&mut self, position_ms: u64) -> Result<Frame> {
            Ok(Frame {
                width: 2,
                height: 1,
                pixel_format: PixelFormat::Rgb8,
                data: vec![position_ms as u8; 6],
                ts: None,
            })
        }
    }

    struct SlowClip;

    impl VideoClip for SlowClip {
        fn duration_ms(&self) -> u64 {
            5000
        }

        fn frame_at(&mut self, _position_ms: u64) -> Result<Frame> {
            thread::sleep(Duration::from_millis(300));
            Ok(Frame {
                width: 1,
                height: 1,
                pixel_format: PixelFormat::Rgb8,
                data: vec![0; 3],
                ts: None,
            })
        }
    }

    #[test]
    fn extraction_round_trips() {
        let handle = ClipHandle::spawn(Box::new(InstantClip));
        let frame = handle.frame_at(42, Duration::from_secs(1)).unwrap();
        assert_eq!(frame.data[0], 42);
        assert_eq!(handle.duration_ms(), 5000);
    }

    #[test]
    fn slow_extraction_times_out() {
        let handle = ClipHandle::spawn(Box::new(SlowClip));
        assert!(handle.frame_at(0, Duration::from_millis(20)).is_none());
    }

    #[test]
    fn worker_survives_a_timed_out_request() {
        let handle = ClipHandle::spawn(Box::new(SlowClip));
        assert!(handle.frame_at(0, Duration::from_millis(20)).is_none());
        // The next request still gets served once the worker drains.
        assert!(handle.frame_at(0, Duration::from_secs(2)).is_some());
    }
}
