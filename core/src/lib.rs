//! Montage derivation core: turns raw multichannel biosignal buffers into
//! referenced, zero-phase filtered derived channels.
//!
//! The host owns every buffer. Producers publish samples through a
//! monotonic watermark and the engine reads them without locks, failing a
//! call with `NotReady` instead of waiting when data is still missing.

pub mod buffer;
pub mod config;
pub mod engine;
pub mod filters;
pub mod host;
pub mod math;
pub mod montage;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use buffer::{FreshnessGate, OutputBuffer, SignalBuffer};
pub use config::{CacheScope, EngineConfig};
pub use engine::{DerivationEngine, DerivationSummary};
pub use host::{ChannelDefinitionInput, HostBridge, OperationResult};
pub use montage::{ChannelDefinition, DataGap, SignalKind};
pub use prelude::{DerivationError, DerivationResult, ProcessingStage};
