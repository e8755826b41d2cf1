//! Camera interception adapter.
//!
//! Installs interception bindings over every camera generation the
//! platform offers and hands out hooked entry points. Frame-sink
//! registration is wrapped so the caller-supplied callback is retained as
//! the original and a [`SubstitutingSink`] takes its place; device handles
//! are re-bound lazily per instance once open completes, because handles
//! are created dynamically and cannot be bound ahead of time.

use crate::intercept::{Call, Hooks, InterceptRegistry, MethodKey, RealFn, Wrapped};
use crate::substitute::SubstitutingSink;
use crate::traits::{CameraApi, CameraPlatform};
use crate::types::{ApiGeneration, DeviceHandle, FrameSink};
use crate::{Error, Result};
use feed_source::FeedManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

type Retained = Arc<Mutex<Vec<FrameSink>>>;

fn retain(retained: &Retained, sink: FrameSink) {
    retained
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(sink);
}

/// Lazily install the per-instance binding for a device handle's sink
/// registration. Idempotent: reopening a device reuses the wrapper
/// already in place.
fn bind_device_sink(
    registry: &Arc<InterceptRegistry>,
    api: &Arc<dyn CameraApi>,
    device: &DeviceHandle,
    feed: &FeedManager,
    retained: &Retained,
) -> Arc<Wrapped<FrameSink, ()>> {
    let key = MethodKey::new(
        format!("{}#{}", device.generation().class_name(), device.id()),
        "register_frame_sink",
    );
    let real: RealFn<FrameSink, ()> = {
        let api = api.clone();
        let device = device.clone();
        Arc::new(move |sink: &FrameSink| {
            api.register_frame_sink(&device, sink.clone())
                .map_err(Into::into)
        })
    };
    let hooks = {
        let feed = feed.clone();
        let retained = retained.clone();
        Hooks::new().pre(move |call: &mut Call<FrameSink, ()>| {
            let original = call.args.clone();
            retain(&retained, original.clone());
            call.args = SubstitutingSink::new(original, feed.clone()).into_sink();
            debug!("frame sink intercepted and replaced");
        })
    };
    registry.bind(key, real, hooks)
}

/// Hooked entry points for one generation; what a hosted process is
/// handed instead of the real API.
pub struct HookedCameraApi {
    generation: ApiGeneration,
    inner: Arc<dyn CameraApi>,
    open: Arc<Wrapped<String, DeviceHandle>>,
    registry: Arc<InterceptRegistry>,
    feed: FeedManager,
    retained: Retained,
}

impl CameraApi for HookedCameraApi {
    fn generation(&self) -> ApiGeneration {
        self.generation
    }

    fn open_device(&self, device_id: &str) -> Result<DeviceHandle> {
        self.open
            .invoke(device_id.to_string())
            .map_err(|e| Error::Device(e.to_string()))
    }

    fn register_frame_sink(&self, device: &DeviceHandle, sink: FrameSink) -> Result<()> {
        let wrapped = bind_device_sink(
            &self.registry,
            &self.inner,
            device,
            &self.feed,
            &self.retained,
        );
        wrapped
            .invoke(sink)
            .map_err(|e| Error::Device(e.to_string()))
    }
}

#[derive(Default)]
struct State {
    installed: bool,
    apis: HashMap<ApiGeneration, Arc<HookedCameraApi>>,
}

/// Owns the interception lifecycle for all camera generations.
pub struct HookManager {
    registry: Arc<InterceptRegistry>,
    feed: FeedManager,
    retained: Retained,
    state: Mutex<State>,
}

impl HookManager {
    pub fn new(feed: FeedManager) -> Self {
        Self {
            registry: Arc::new(InterceptRegistry::new()),
            feed,
            retained: Arc::new(Mutex::new(Vec::new())),
            state: Mutex::new(State::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn feed(&self) -> &FeedManager {
        &self.feed
    }

    /// Install bindings for every generation the platform provides.
    /// Idempotent; a generation absent on this platform version is logged
    /// as `BindingNotFound` and skipped.
    pub fn install(&self, platform: &dyn CameraPlatform) {
        let mut state = self.lock_state();
        if state.installed {
            warn!("camera hooks already installed");
            return;
        }
        for generation in ApiGeneration::ALL {
            match platform.api(generation) {
                Some(api) => {
                    let hooked = self.bind_generation(generation, api);
                    state.apis.insert(generation, hooked);
                    debug!(%generation, "camera generation hooked");
                }
                None => {
                    let key = MethodKey::new(generation.class_name(), "open_device");
                    warn!("{}", Error::BindingNotFound(key.to_string()));
                }
            }
        }
        state.installed = true;
        debug!("camera hooks installed");
    }

    /// Clear all bindings and forget retained callbacks. Already-open
    /// device handles keep their last-substituted sink.
    pub fn uninstall(&self) {
        let mut state = self.lock_state();
        if !state.installed {
            return;
        }
        self.registry.unbind_all();
        self.retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        state.apis.clear();
        state.installed = false;
        debug!("camera hooks uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        self.lock_state().installed
    }

    /// The hooked entry points for a generation, when the platform has it.
    pub fn api(&self, generation: ApiGeneration) -> Option<Arc<dyn CameraApi>> {
        self.lock_state()
            .apis
            .get(&generation)
            .cloned()
            .map(|api| api as Arc<dyn CameraApi>)
    }

    pub fn binding_count(&self) -> usize {
        self.registry.len()
    }

    pub fn retained_count(&self) -> usize {
        self.retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn bind_generation(
        &self,
        generation: ApiGeneration,
        api: Arc<dyn CameraApi>,
    ) -> Arc<HookedCameraApi> {
        let key = MethodKey::new(generation.class_name(), "open_device");
        let real: RealFn<String, DeviceHandle> = {
            let api = api.clone();
            Arc::new(move |device_id: &String| api.open_device(device_id).map_err(Into::into))
        };
        let hooks = {
            let registry = self.registry.clone();
            let api = api.clone();
            let feed = self.feed.clone();
            let retained = self.retained.clone();
            Hooks::new().post(move |call: &mut Call<String, DeviceHandle>| {
                if let Some(Ok(handle)) = call.outcome() {
                    let handle = handle.clone();
                    bind_device_sink(&registry, &api, &handle, &feed, &retained);
                }
            })
        };
        let open = self.registry.bind(key, real, hooks);
        Arc::new(HookedCameraApi {
            generation,
            inner: api,
            open,
            registry: self.registry.clone(),
            feed: self.feed.clone(),
            retained: self.retained.clone(),
        })
    }
}
