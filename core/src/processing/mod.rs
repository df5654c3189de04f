pub mod extract;
pub mod pipeline;
pub mod reference;
pub mod stages;

pub use extract::WindowExtractor;
pub use pipeline::{DerivationPipeline, DerivedChannel};
pub use reference::ReferenceComputer;
pub use stages::{DegapStage, FilterStage, FitStage, TrimStage};
