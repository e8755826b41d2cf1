use crate::types::{ApiGeneration, DeviceHandle, FrameSink};
use crate::Result;
use std::sync::Arc;

/// Entry points of one camera API generation. A real implementation
/// delegates to the platform; the hooked implementation routes both entry
/// points through interception bindings.
pub trait CameraApi: Send + Sync {
    fn generation(&self) -> ApiGeneration;

    /// Open a device by identifier.
    fn open_device(&self, device_id: &str) -> Result<DeviceHandle>;

    /// Register the callback that receives captured frames for `device`.
    fn register_frame_sink(&self, device: &DeviceHandle, sink: FrameSink) -> Result<()>;
}

/// The running platform: which camera generations exist and their real
/// entry points.
pub trait CameraPlatform: Send + Sync {
    /// `None` when this platform version does not provide the generation.
    fn api(&self, generation: ApiGeneration) -> Option<Arc<dyn CameraApi>>;
}
