use crate::{Frame, Result};

/// A decodable clip the feed manager pulls frames from on demand.
///
/// Implementations decode the frame nearest a playback position rather than
/// running a live pipeline; the manager models the playback clock itself.
pub trait VideoClip: Send {
    /// Total clip duration in milliseconds.
    fn duration_ms(&self) -> u64;

    /// Decode the frame nearest to `position_ms`. May block on disk or
    /// codec I/O for tens of milliseconds.
    fn frame_at(&mut self, position_ms: u64) -> Result<Frame>;

    /// Whether this backend honors variable-rate playback.
    fn supports_rate(&self) -> bool {
        false
    }
}
