pub mod gate;
pub mod output;
pub mod signal;

pub use gate::{FreshnessGate, NotReadyReason};
pub use output::OutputBuffer;
pub use signal::{BufferWriteError, SignalBuffer, Watermark, WatermarkSnapshot, UNWRITTEN};
