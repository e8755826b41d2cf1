use crate::clock::PlaybackClock;
use crate::extract::ClipHandle;
use crate::photo;
use crate::{Error, FeedConfig, FeedKind, FeedTuning, Frame, PlaybackState, Result, VideoClip};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, warn};

type FrameObserver = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Process-wide substitute feed engine.
///
/// Cheap to clone; all clones share one state block behind a single mutex.
/// Configuration changes (UI thread) and frame requests (capture thread)
/// race against that mutex, while actual frame decoding is serialized
/// through the clip-owning worker in [`crate::extract`] so the lock is
/// never held across codec I/O.
#[derive(Clone)]
pub struct FeedManager {
    shared: Arc<Shared>,
}

struct Shared {
    tuning: FeedTuning,
    inner: Mutex<Inner>,
}

struct Inner {
    initialized: bool,
    config: FeedConfig,
    state: PlaybackState,
    photo: Option<Frame>,
    clip: Option<ClipHandle>,
    clock: Option<PlaybackClock>,
    last_frame: Option<Frame>,
    observer: Option<FrameObserver>,
    looping: bool,
    epoch: u64,
}

impl Inner {
    fn release_resource(&mut self) {
        // Dropping the handle closes the request channel; the extraction
        // worker exits on its own.
        self.clip = None;
        self.photo = None;
        self.clock = None;
        self.last_frame = None;
        self.state = PlaybackState::Idle;
        self.epoch += 1;
    }

    fn has_video(&self) -> bool {
        matches!(
            self.config.kind,
            FeedKind::LocalVideo | FeedKind::NetworkVideo
        ) && self.clip.is_some()
    }
}

impl Default for FeedManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedManager {
    pub fn new() -> Self {
        Self::with_tuning(FeedTuning::default())
    }

    pub fn with_tuning(tuning: FeedTuning) -> Self {
        Self {
            shared: Arc::new(Shared {
                tuning,
                inner: Mutex::new(Inner {
                    initialized: false,
                    config: FeedConfig::disabled(),
                    state: PlaybackState::Idle,
                    photo: None,
                    clip: None,
                    clock: None,
                    last_frame: None,
                    observer: None,
                    looping: true,
                    epoch: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the manager usable. Idempotent.
    pub fn initialize(&self) {
        let mut inner = self.lock();
        if !inner.initialized {
            inner.initialized = true;
            debug!("feed manager initialized");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Swap in a new feed configuration. The previous substitute resource
    /// is always released first, even when reconfiguring identically.
    pub fn configure(&self, config: FeedConfig) -> bool {
        let mut inner = self.lock();
        if !inner.initialized {
            error!("configure rejected: {}", Error::NotInitialized);
            return false;
        }

        inner.release_resource();
        inner.config = config.clone();
        debug!(kind = ?config.kind, source = ?config.source, audio = config.audio_enabled, "configuring feed");

        match config.kind {
            FeedKind::Disabled => true,
            FeedKind::Photo => self.prepare_photo(&mut inner),
            FeedKind::LocalVideo => self.prepare_local_video(&mut inner),
            FeedKind::NetworkVideo => {
                let Some(url) = config.source else {
                    error!("network video source is empty");
                    return false;
                };
                let epoch = inner.epoch;
                drop(inner);
                self.spawn_network_prepare(url, epoch);
                true
            }
        }
    }

    fn prepare_photo(&self, inner: &mut Inner) -> bool {
        let Some(path) = inner.config.source.clone() else {
            error!("photo source is empty");
            return false;
        };
        let tuning = &self.shared.tuning;
        match photo::load_photo(&path, tuning.max_photo_long_edge, tuning.max_photo_short_edge) {
            Ok(frame) => {
                debug!(width = frame.width, height = frame.height, "photo prepared");
                inner.photo = Some(frame);
                inner.state = PlaybackState::Idle;
                true
            }
            Err(e) => {
                error!("preparing photo failed: {e}");
                false
            }
        }
    }

    fn prepare_local_video(&self, inner: &mut Inner) -> bool {
        let Some(path) = inner.config.source.clone() else {
            error!("video source is empty");
            return false;
        };
        match open_local_clip(&path) {
            Ok(clip) => {
                let handle = ClipHandle::spawn(clip);
                debug!(
                    duration_ms = handle.duration_ms(),
                    looping = inner.looping,
                    audio = inner.config.audio_enabled,
                    "local video prepared"
                );
                inner.clock = Some(PlaybackClock::new(handle.duration_ms(), inner.looping));
                inner.clip = Some(handle);
                inner.state = PlaybackState::Idle;
                true
            }
            Err(e) => {
                error!("preparing local video failed: {e}");
                false
            }
        }
    }

    fn spawn_network_prepare(&self, url: String, epoch: u64) {
        let manager = self.clone();
        let builder = thread::Builder::new().name("feed-prepare".into());
        let spawned = builder.spawn(move || {
            let opened = open_network_clip(&url);
            let mut inner = manager.lock();
            if inner.epoch != epoch {
                debug!(url, "discarding stale network preparation");
                return;
            }
            match opened {
                Ok(clip) => {
                    let handle = ClipHandle::spawn(clip);
                    debug!(url, duration_ms = handle.duration_ms(), "network video prepared");
                    inner.clock = Some(PlaybackClock::new(handle.duration_ms(), inner.looping));
                    inner.clip = Some(handle);
                    inner.state = PlaybackState::Idle;
                }
                Err(e) => error!("preparing network video failed: {e}"),
            }
        });
        if let Err(e) = spawned {
            error!("failed to spawn network preparation: {e}");
        }
    }

    pub fn play(&self) {
        let mut inner = self.lock();
        if !inner.initialized {
            warn!("play rejected: {}", Error::NotInitialized);
            return;
        }
        match inner.config.kind {
            FeedKind::Photo => {
                let Some(frame) = inner.photo.clone() else {
                    warn!("cannot play: no photo prepared");
                    return;
                };
                inner.state = PlaybackState::Playing;
                let observer = inner.observer.clone();
                drop(inner);
                if let Some(observer) = observer {
                    observer(&frame);
                }
            }
            FeedKind::LocalVideo | FeedKind::NetworkVideo => {
                if !inner.has_video() {
                    warn!("cannot play: no clip prepared");
                    return;
                }
                if inner.state != PlaybackState::Playing {
                    if let Some(clock) = inner.clock.as_mut() {
                        clock.start(Instant::now());
                    }
                    inner.state = PlaybackState::Playing;
                    debug!("playback started");
                }
            }
            FeedKind::Disabled => warn!("cannot play: feed is disabled"),
        }
    }

    pub fn pause(&self) {
        let mut inner = self.lock();
        if !inner.has_video() || inner.state != PlaybackState::Playing {
            return;
        }
        if let Some(clock) = inner.clock.as_mut() {
            clock.pause(Instant::now());
        }
        inner.state = PlaybackState::Paused;
        debug!("playback paused");
    }

    pub fn stop(&self) {
        let mut inner = self.lock();
        if !inner.has_video() {
            return;
        }
        if let Some(clock) = inner.clock.as_mut() {
            clock.stop();
        }
        inner.state = PlaybackState::Stopped;
        debug!("playback stopped");
    }

    /// Seek to an absolute position, clamped to `[0, duration]`. Returns
    /// the resulting position, or `None` without a prepared video.
    pub fn seek_to(&self, position_ms: u64) -> Option<u64> {
        let mut inner = self.lock();
        if !inner.has_video() {
            return None;
        }
        let clock = inner.clock.as_mut()?;
        let landed = clock.seek(position_ms, Instant::now());
        debug!(position_ms, landed, "seek");
        Some(landed)
    }

    pub fn seek_forward(&self, delta_ms: u64) -> Option<u64> {
        let current = self.position_ms();
        self.seek_to(current.saturating_add(delta_ms))
    }

    pub fn seek_backward(&self, delta_ms: u64) -> Option<u64> {
        let current = self.position_ms();
        self.seek_to(current.saturating_sub(delta_ms))
    }

    /// Apply a playback-rate factor when the backend supports it;
    /// otherwise logged and ignored.
    pub fn set_playback_speed(&self, factor: f64) {
        let mut inner = self.lock();
        let Some(clip) = inner.clip.as_ref() else {
            return;
        };
        if !clip.supports_rate() {
            warn!(factor, "variable-rate playback not supported by this source");
            return;
        }
        if let Some(clock) = inner.clock.as_mut() {
            clock.set_speed(factor, Instant::now());
            debug!(factor, "playback speed set");
        }
    }

    pub fn set_looping(&self, looping: bool) {
        let mut inner = self.lock();
        inner.looping = looping;
        if let Some(clock) = inner.clock.as_mut() {
            clock.set_looping(looping);
        }
        debug!(looping, "looping set");
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        let mut inner = self.lock();
        inner.config.audio_enabled = enabled;
        debug!(enabled, "audio set");
    }

    pub fn position_ms(&self) -> u64 {
        self.lock()
            .clock
            .as_ref()
            .map(PlaybackClock::position_ms)
            .unwrap_or(0)
    }

    pub fn duration_ms(&self) -> u64 {
        self.lock()
            .clip
            .as_ref()
            .map(ClipHandle::duration_ms)
            .unwrap_or(0)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.playback_state() == PlaybackState::Playing
    }

    pub fn feed_kind(&self) -> FeedKind {
        self.lock().config.kind
    }

    pub fn current_config(&self) -> FeedConfig {
        self.lock().config.clone()
    }

    /// The current substitute frame: the decoded photo, or the video frame
    /// nearest the playback position (decode-on-demand, bounded by
    /// `FeedTuning::extract_timeout`). Past the deadline the previously
    /// extracted frame is repeated; `None` when nothing is available.
    pub fn current_frame(&self) -> Option<Frame> {
        let (handle, position, epoch, previous) = {
            let inner = self.lock();
            if !inner.initialized {
                warn!("frame request rejected: {}", Error::NotInitialized);
                return None;
            }
            match inner.config.kind {
                FeedKind::Disabled => return None,
                FeedKind::Photo => return inner.photo.clone(),
                FeedKind::LocalVideo | FeedKind::NetworkVideo => {
                    let handle = inner.clip.clone()?;
                    let position = inner
                        .clock
                        .as_ref()
                        .map(PlaybackClock::position_ms)
                        .unwrap_or(0);
                    (handle, position, inner.epoch, inner.last_frame.clone())
                }
            }
        };

        match handle.frame_at(position, self.shared.tuning.extract_timeout) {
            Some(frame) => {
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    inner.last_frame = Some(frame.clone());
                }
                Some(frame)
            }
            None => {
                if previous.is_some() {
                    debug!(position, "extraction missed deadline; repeating previous frame");
                }
                previous
            }
        }
    }

    /// Register the observer that receives the static frame when a photo
    /// feed starts playing.
    pub fn set_frame_observer(&self, observer: impl Fn(&Frame) + Send + Sync + 'static) {
        self.lock().observer = Some(Arc::new(observer));
    }

    /// Release the playback resource and decoded image, returning to Idle.
    /// Configuration and the frame observer survive.
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        inner.release_resource();
        debug!("cleanup completed");
    }

    /// Cleanup plus observer removal; the manager must be re-initialized
    /// before reuse.
    pub fn release(&self) {
        let mut inner = self.lock();
        inner.release_resource();
        inner.observer = None;
        inner.config = FeedConfig::disabled();
        inner.initialized = false;
        debug!("feed manager released");
    }
}

#[cfg(feature = "ffmpeg")]
fn open_local_clip(path: &str) -> Result<Box<dyn VideoClip>> {
    Ok(Box::new(crate::ffmpeg_backend::FfmpegClip::open_local(
        path,
    )?))
}

#[cfg(feature = "ffmpeg")]
fn open_network_clip(url: &str) -> Result<Box<dyn VideoClip>> {
    Ok(Box::new(crate::ffmpeg_backend::FfmpegClip::open_url(url)?))
}

#[cfg(all(feature = "mock", not(feature = "ffmpeg")))]
fn open_local_clip(path: &str) -> Result<Box<dyn VideoClip>> {
    Ok(Box::new(crate::mock::MockClip::open_local(path)?))
}

#[cfg(all(feature = "mock", not(feature = "ffmpeg")))]
fn open_network_clip(url: &str) -> Result<Box<dyn VideoClip>> {
    Ok(Box::new(crate::mock::MockClip::open_url(url)?))
}

#[cfg(not(any(feature = "mock", feature = "ffmpeg")))]
fn open_local_clip(_path: &str) -> Result<Box<dyn VideoClip>> {
    Err(Error::Unsupported("no video backend enabled"))
}

#[cfg(not(any(feature = "mock", feature = "ffmpeg")))]
fn open_network_clip(_url: &str) -> Result<Box<dyn VideoClip>> {
    Err(Error::Unsupported("no video backend enabled"))
}
