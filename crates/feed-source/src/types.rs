use std::time::Duration;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Rgb8,
    Nv21,
}

/// A single frame of the substitute feed.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    pub ts: Option<OffsetDateTime>,
}

impl Frame {
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::Rgb8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        }
    }
}

/// What the substitute feed is backed by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedKind {
    Disabled,
    Photo,
    LocalVideo,
    NetworkVideo,
}

/// Feed configuration, set as a unit. Changing it always releases the
/// previous substitute resource before acquiring the new one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub source: Option<String>,
    pub audio_enabled: bool,
}

impl FeedConfig {
    pub fn disabled() -> Self {
        Self {
            kind: FeedKind::Disabled,
            source: None,
            audio_enabled: true,
        }
    }

    pub fn photo(path: impl Into<String>) -> Self {
        Self {
            kind: FeedKind::Photo,
            source: Some(path.into()),
            audio_enabled: true,
        }
    }

    pub fn local_video(path: impl Into<String>, audio_enabled: bool) -> Self {
        Self {
            kind: FeedKind::LocalVideo,
            source: Some(path.into()),
            audio_enabled,
        }
    }

    pub fn network_video(url: impl Into<String>, audio_enabled: bool) -> Self {
        Self {
            kind: FeedKind::NetworkVideo,
            source: Some(url.into()),
            audio_enabled,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// Tunables with safe defaults. `extract_timeout` bounds decode-on-demand
/// frame extraction so a slow codec cannot stall the camera pipeline.
#[derive(Clone, Copy, Debug)]
pub struct FeedTuning {
    pub extract_timeout: Duration,
    pub max_photo_long_edge: u32,
    pub max_photo_short_edge: u32,
}

impl Default for FeedTuning {
    fn default() -> Self {
        Self {
            extract_timeout: Duration::from_millis(200),
            max_photo_long_edge: 1920,
            max_photo_short_edge: 1080,
        }
    }
}

/// Default step for seek_forward/seek_backward, in milliseconds.
pub const DEFAULT_SEEK_STEP_MS: u64 = 5000;
