use crate::{Error, Frame, Result, VideoClip};
use std::path::Path;
use time::OffsetDateTime;

const MOCK_WIDTH: u32 = 320;
const MOCK_HEIGHT: u32 = 240;
const MOCK_DURATION_MS: u64 = 10_000;

/// A deterministic synthetic clip. Local opens still require the file to
/// exist so missing-source behavior matches a real backend; network opens
/// validate the URL scheme instead.
pub struct MockClip {
    duration_ms: u64,
    variable_rate: bool,
}

impl MockClip {
    pub fn open_local(path: &str) -> Result<Self> {
        if !Path::new(path).is_file() {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(Self {
            duration_ms: MOCK_DURATION_MS,
            variable_rate: true,
        })
    }

    pub fn open_url(url: &str) -> Result<Self> {
        let supported = ["http://", "https://", "rtsp://"];
        if !supported.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(Error::PrepareFailed(format!("unsupported url: {url}")));
        }
        // Streams report a fixed-rate source.
        Ok(Self {
            duration_ms: MOCK_DURATION_MS,
            variable_rate: false,
        })
    }
}

impl VideoClip for MockClip {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn frame_at(&mut self, position_ms: u64) -> Result<Frame> {
        let position = position_ms.min(self.duration_ms);
        // Gradient ramp that shifts with playback position so consecutive
        // extractions are distinguishable in tests.
        let shift = (position / 40) as u32;
        let mut data = Vec::with_capacity((MOCK_WIDTH * MOCK_HEIGHT * 3) as usize);
        for y in 0..MOCK_HEIGHT {
            for x in 0..MOCK_WIDTH {
                let v = ((x + y + shift) % 256) as u8;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Ok(Frame {
            width: MOCK_WIDTH,
            height: MOCK_HEIGHT,
            pixel_format: crate::PixelFormat::Rgb8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }

    fn supports_rate(&self) -> bool {
        self.variable_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_open_requires_existing_file() {
        assert!(matches!(
            MockClip::open_local("/nonexistent/clip.mp4"),
            Err(Error::NotFound(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"stub").unwrap();
        let clip = MockClip::open_local(&path.to_string_lossy()).unwrap();
        assert_eq!(clip.duration_ms(), MOCK_DURATION_MS);
        assert!(clip.supports_rate());
    }

    #[test]
    fn url_open_validates_scheme() {
        assert!(MockClip::open_url("ftp://example.com/x").is_err());
        let clip = MockClip::open_url("https://example.com/stream").unwrap();
        assert!(!clip.supports_rate());
    }

    #[test]
    fn frames_vary_with_position() {
        let mut clip = MockClip::open_url("http://example.com/s").unwrap();
        let a = clip.frame_at(0).unwrap();
        let b = clip.frame_at(2000).unwrap();
        assert_eq!(a.width, MOCK_WIDTH);
        assert_ne!(a.data, b.data);
    }
}
