use crate::types::FrameSink;
use feed_source::{nv21, FeedManager, Frame};
use std::sync::Arc;
use tracing::warn;

/// Typed decorator around an application's frame sink.
///
/// Holds the original callback and delegates to it after applying
/// substitution: when the feed manager has a current frame it is encoded
/// into the camera-native NV21 layout and delivered instead of the real
/// frame; when it does not (feed disabled, not yet prepared, extraction or
/// conversion failure), the real frame passes through unchanged. This path
/// must never fail outward — the hosted application always receives some
/// valid frame.
pub struct SubstitutingSink {
    original: FrameSink,
    feed: FeedManager,
}

impl SubstitutingSink {
    pub fn new(original: FrameSink, feed: FeedManager) -> Self {
        Self { original, feed }
    }

    pub fn deliver(&self, real: &Frame) {
        match self.substitute() {
            Some(frame) => (self.original)(&frame),
            None => (self.original)(real),
        }
    }

    fn substitute(&self) -> Option<Frame> {
        let rgb = self.feed.current_frame()?;
        match nv21::encode_frame(&rgb) {
            Some(frame) => Some(frame),
            None => {
                warn!(
                    width = rgb.width,
                    height = rgb.height,
                    "substitute frame conversion failed; passing real frame through"
                );
                None
            }
        }
    }

    /// Erase into the sink type a camera generation expects.
    pub fn into_sink(self) -> FrameSink {
        let sink = Arc::new(self);
        Arc::new(move |frame: &Frame| sink.deliver(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_source::{FeedConfig, PixelFormat};
    use std::sync::Mutex;

    fn real_frame() -> Frame {
        Frame {
            width: 4,
            height: 2,
            pixel_format: PixelFormat::Nv21,
            data: vec![9; 12],
            ts: None,
        }
    }

    fn capture() -> (FrameSink, Arc<Mutex<Vec<Frame>>>) {
        let seen: Arc<Mutex<Vec<Frame>>> = Arc::new(Mutex::new(Vec::new()));
        let into = seen.clone();
        let sink: FrameSink = Arc::new(move |frame: &Frame| {
            into.lock().unwrap().push(frame.clone());
        });
        (sink, seen)
    }

    #[test]
    fn disabled_feed_passes_real_frame_through_unchanged() {
        let feed = FeedManager::new();
        feed.initialize();
        assert!(feed.configure(FeedConfig::disabled()));

        let (sink, seen) = capture();
        let substituting = SubstitutingSink::new(sink, feed).into_sink();
        let real = real_frame();
        substituting(&real);

        let delivered = seen.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].data, real.data);
        assert_eq!(delivered[0].pixel_format, PixelFormat::Nv21);
    }

    #[test]
    fn prepared_photo_replaces_the_real_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        image::RgbImage::from_pixel(16, 8, image::Rgb([200, 10, 60]))
            .save(&path)
            .unwrap();

        let feed = FeedManager::new();
        feed.initialize();
        assert!(feed.configure(FeedConfig::photo(path.to_string_lossy())));

        let (sink, seen) = capture();
        let substituting = SubstitutingSink::new(sink, feed).into_sink();
        substituting(&real_frame());

        let delivered = seen.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].pixel_format, PixelFormat::Nv21);
        assert_eq!((delivered[0].width, delivered[0].height), (16, 8));
        assert_ne!(delivered[0].data, real_frame().data);
    }

    #[test]
    fn uninitialized_feed_falls_back_to_real() {
        let feed = FeedManager::new();
        let (sink, seen) = capture();
        SubstitutingSink::new(sink, feed).deliver(&real_frame());
        assert_eq!(seen.lock().unwrap()[0].data, real_frame().data);
    }
}
