//! camera-intercept: method interception and camera API substitution
//!
//! A generic interception layer (pre/post hooks around a wrapped method)
//! plus typed adapters for the three camera API generations. Frame-sink
//! registrations are decorated so the hosted application receives frames
//! from the substitute feed when one is prepared, and the real camera
//! frame otherwise — the delivery path never fails outward.

mod error;
pub use error::{Error, Result};

pub mod intercept;
pub use intercept::{Call, HookError, HookResult, Hooks, InterceptRegistry, MethodKey, Wrapped};

mod types;
pub use types::{ApiGeneration, DeviceHandle, FrameSink};

mod traits;
pub use traits::{CameraApi, CameraPlatform};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{MockCameraApi, MockPlatform, PipelineApi};

mod substitute;
pub use substitute::SubstitutingSink;

mod adapter;
pub use adapter::{HookManager, HookedCameraApi};
