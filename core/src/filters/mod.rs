pub mod cache;
pub mod defaults;
pub mod design;
pub mod sos;

pub use cache::{CoefficientCache, CoefficientKey};
pub use defaults::{DefaultFilters, FilterKind, FilterSetting, FilterSpec, NOTCH_HALF_WIDTH_HZ};
pub use design::{butter_sos, Band, DesignError};
pub use sos::{sosfilt, sosfilt_zi, sosfiltfilt};
