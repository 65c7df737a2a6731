//! Engine core
//!
//! The lifecycle controller plus everything it owns: the master effect bus,
//! per-voice chains, the voice resource pool, the loop transport, and the
//! lifecycle event bus.

pub mod bus;
pub mod chain;
pub mod controller;
pub mod events;
pub mod pool;
pub mod transport;

pub use bus::MasterBus;
pub use chain::{ChainManager, EffectParams};
pub use controller::{AudioEngine, EngineState, PerformanceMetrics, PlayOptions, StartOutcome};
pub use events::{EngineEvent, EventBus};
pub use pool::{Lease, PoolStats, ResourcePool};
pub use transport::{LoopCallback, Transport};
