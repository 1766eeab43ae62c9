//! Audio capture: device capability, session state machine, asset assembly
//!
//! The capture device is an injected capability so that any implementation
//! able to negotiate an encoding and stream encoded chunks can substitute
//! for a real microphone (including scripted devices in tests).

pub mod asset;
pub mod controller;
pub mod device;

pub use asset::{extension_for_mime, AudioAsset, CANONICAL_MIME};
pub use controller::{CaptureController, SessionState, SessionStats};
pub use device::{
    negotiate_encoding, BufferedDevice, CaptureChunk, CaptureDevice, DeviceConstraints,
    FALLBACK_ENCODING, PREFERRED_ENCODINGS,
};
