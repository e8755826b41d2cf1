use feed_source::Frame;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// The three camera API generations the adapter covers: the legacy
/// single-camera entry points, the device/session model, and the
/// higher-level pipeline layered on the device model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ApiGeneration {
    Legacy,
    Device,
    Pipeline,
}

impl ApiGeneration {
    pub const ALL: [ApiGeneration; 3] = [
        ApiGeneration::Legacy,
        ApiGeneration::Device,
        ApiGeneration::Pipeline,
    ];

    /// Target class name used for interception keys.
    pub fn class_name(&self) -> &'static str {
        match self {
            ApiGeneration::Legacy => "Camera",
            ApiGeneration::Device => "CameraDevice",
            ApiGeneration::Pipeline => "CapturePipeline",
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// The callback mechanism a camera generation delivers captured frames
/// through.
pub type FrameSink = Arc<dyn Fn(&Frame) + Send + Sync>;

/// A dynamically created device handle. The platform delivers frames to
/// whatever sink is currently registered on the handle; handles cannot be
/// bound ahead of time, only after open completes.
#[derive(Clone)]
pub struct DeviceHandle {
    id: String,
    generation: ApiGeneration,
    sink: Arc<Mutex<Option<FrameSink>>>,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, generation: ApiGeneration) -> Self {
        Self {
            id: id.into(),
            generation,
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> ApiGeneration {
        self.generation
    }

    pub fn set_sink(&self, sink: FrameSink) {
        *self.lock() = Some(sink);
    }

    pub fn clear_sink(&self) {
        *self.lock() = None;
    }

    pub fn has_sink(&self) -> bool {
        self.lock().is_some()
    }

    /// Deliver a captured frame to the registered sink. The slot lock is
    /// released before the sink runs, so sinks may block or re-register.
    pub fn deliver(&self, frame: &Frame) {
        let sink = self.lock().clone();
        if let Some(sink) = sink {
            sink(frame);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<FrameSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("has_sink", &self.has_sink())
            .finish()
    }
}
