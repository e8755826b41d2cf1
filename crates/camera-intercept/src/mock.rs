use crate::traits::{CameraApi, CameraPlatform};
use crate::types::{ApiGeneration, DeviceHandle, FrameSink};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-process camera generation for tests and demos. Devices are created
/// on open and remembered so tests can push simulated captured frames
/// through their handles.
pub struct MockCameraApi {
    generation: ApiGeneration,
    devices: Mutex<HashMap<String, DeviceHandle>>,
}

impl MockCameraApi {
    pub fn new(generation: ApiGeneration) -> Arc<Self> {
        Arc::new(Self {
            generation,
            devices: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeviceHandle>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn device(&self, device_id: &str) -> Option<DeviceHandle> {
        self.lock().get(device_id).cloned()
    }

    pub fn open_count(&self) -> usize {
        self.lock().len()
    }
}

impl CameraApi for MockCameraApi {
    fn generation(&self) -> ApiGeneration {
        self.generation
    }

    fn open_device(&self, device_id: &str) -> Result<DeviceHandle> {
        if device_id.is_empty() {
            return Err(Error::Device("empty device id".to_string()));
        }
        let mut devices = self.lock();
        let handle = devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceHandle::new(device_id, self.generation));
        Ok(handle.clone())
    }

    fn register_frame_sink(&self, device: &DeviceHandle, sink: FrameSink) -> Result<()> {
        device.set_sink(sink);
        Ok(())
    }
}

/// The pipeline generation is a thin layer over the device generation:
/// opening a pipeline opens the underlying device, and its analyzer sink
/// is the device's frame sink.
pub struct PipelineApi {
    inner: Arc<dyn CameraApi>,
}

impl PipelineApi {
    pub fn over(inner: Arc<dyn CameraApi>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

impl CameraApi for PipelineApi {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::Pipeline
    }

    fn open_device(&self, device_id: &str) -> Result<DeviceHandle> {
        self.inner.open_device(device_id)
    }

    fn register_frame_sink(&self, device: &DeviceHandle, sink: FrameSink) -> Result<()> {
        self.inner.register_frame_sink(device, sink)
    }
}

/// A platform offering a configurable subset of the camera generations.
pub struct MockPlatform {
    apis: HashMap<ApiGeneration, Arc<dyn CameraApi>>,
}

impl MockPlatform {
    /// All three generations, with the pipeline layered over the device
    /// generation.
    pub fn full() -> Self {
        Self::with_generations(&ApiGeneration::ALL)
    }

    pub fn with_generations(generations: &[ApiGeneration]) -> Self {
        let mut apis: HashMap<ApiGeneration, Arc<dyn CameraApi>> = HashMap::new();
        if generations.contains(&ApiGeneration::Legacy) {
            apis.insert(
                ApiGeneration::Legacy,
                MockCameraApi::new(ApiGeneration::Legacy),
            );
        }
        if generations.contains(&ApiGeneration::Device)
            || generations.contains(&ApiGeneration::Pipeline)
        {
            let device = MockCameraApi::new(ApiGeneration::Device);
            if generations.contains(&ApiGeneration::Device) {
                apis.insert(ApiGeneration::Device, device.clone());
            }
            if generations.contains(&ApiGeneration::Pipeline) {
                apis.insert(ApiGeneration::Pipeline, PipelineApi::over(device));
            }
        }
        Self { apis }
    }
}

impl CameraPlatform for MockPlatform {
    fn api(&self, generation: ApiGeneration) -> Option<Arc<dyn CameraApi>> {
        self.apis.get(&generation).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_source::{Frame, PixelFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn open_is_idempotent_per_device_id() {
        let api = MockCameraApi::new(ApiGeneration::Legacy);
        let a = api.open_device("cam0").unwrap();
        let b = api.open_device("cam0").unwrap();
        assert_eq!(api.open_count(), 1);

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        api.register_frame_sink(&a, Arc::new(move |_f| {
            seen.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        b.deliver(&Frame {
            width: 1,
            height: 1,
            pixel_format: PixelFormat::Rgb8,
            data: vec![0; 3],
            ts: None,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pipeline_opens_through_the_device_generation() {
        let platform = MockPlatform::full();
        let pipeline = platform.api(ApiGeneration::Pipeline).unwrap();
        let handle = pipeline.open_device("cam0").unwrap();
        assert_eq!(handle.generation(), ApiGeneration::Device);
    }

    #[test]
    fn partial_platform_reports_missing_generations() {
        let platform = MockPlatform::with_generations(&[ApiGeneration::Legacy]);
        assert!(platform.api(ApiGeneration::Legacy).is_some());
        assert!(platform.api(ApiGeneration::Device).is_none());
        assert!(platform.api(ApiGeneration::Pipeline).is_none());
    }
}
