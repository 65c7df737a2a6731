//! Platform audio boundary
//!
//! The engine's only contact with the host platform: a backend trait, a
//! device-free offline implementation, and (optionally) a CPAL device
//! backend.

pub mod backend;
#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;
pub mod error;
pub mod offline;

pub use backend::AudioBackend;
#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalBackend;
pub use error::{EngineError, EngineResult};
pub use offline::OfflineBackend;
