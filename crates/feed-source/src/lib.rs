//! feed-source: substitute camera feed engine
//!
//! Owns the substitute media (still photo or video), its playback state
//! machine, and decode-on-demand frame extraction, plus the NV21 encoder
//! used to hand frames to camera callbacks in their native layout. The
//! default build enables a `mock` clip backend so the workspace compiles
//! and tests on any host; the `ffmpeg` feature swaps in native decoding.

mod types;
pub use types::{
    FeedConfig, FeedKind, FeedTuning, Frame, PixelFormat, PlaybackState, DEFAULT_SEEK_STEP_MS,
};

mod error;
pub use error::{Error, Result};

mod traits;
pub use traits::VideoClip;

pub mod nv21;

mod photo;
pub use photo::{bounded_dimensions, load_photo};

mod clock;
mod extract;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockClip;

#[cfg(feature = "ffmpeg")]
mod ffmpeg_backend;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg_backend::FfmpegClip;

mod manager;
pub use manager::FeedManager;
