pub mod channel;
pub mod registry;

pub use channel::{ChannelDefinition, ChannelFilters, DataGap, FilterOverride, SignalKind};
pub use registry::{Montage, MontageRegistry, WindowRequest};
