use std::collections::HashMap;
use std::sync::Arc;

use ndarray::Array2;

use crate::filters::defaults::{FilterKind, FilterSpec, NOTCH_HALF_WIDTH_HZ};
use crate::filters::design::{butter_sos, Band, DesignError};

/// Identity of a coefficient set. Frequencies are compared bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoefficientKey {
    kind: FilterKind,
    wn_bits: u64,
    fs_bits: u64,
    order: usize,
}

impl CoefficientKey {
    pub fn new(spec: &FilterSpec, fs: f64) -> Self {
        Self {
            kind: spec.kind,
            wn_bits: spec.wn.to_bits(),
            fs_bits: fs.to_bits(),
            order: spec.effective_order(),
        }
    }
}

/// Memoized Butterworth SOS matrices.
#[derive(Debug, Default)]
pub struct CoefficientCache {
    entries: HashMap<CoefficientKey, Arc<Array2<f64>>>,
    designs: usize,
}

impl CoefficientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the SOS matrix for `spec` at `fs`, designing it on first use.
    pub fn get(&mut self, spec: &FilterSpec, fs: f64) -> Result<Arc<Array2<f64>>, DesignError> {
        let key = CoefficientKey::new(spec, fs);
        if let Some(sos) = self.entries.get(&key) {
            return Ok(Arc::clone(sos));
        }

        let band = match spec.kind {
            FilterKind::Highpass => Band::Highpass(spec.wn),
            FilterKind::Lowpass => Band::Lowpass(spec.wn),
            FilterKind::Notch => {
                Band::Bandstop(spec.wn - NOTCH_HALF_WIDTH_HZ, spec.wn + NOTCH_HALF_WIDTH_HZ)
            }
        };
        let sos = Arc::new(butter_sos(spec.effective_order(), band, fs)?);
        self.designs += 1;
        self.entries.insert(key, Arc::clone(&sos));
        Ok(sos)
    }

    /// Number of designs performed since creation or the last [`clear`](Self::clear).
    pub fn designs(&self) -> usize {
        self.designs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.designs = 0;
    }
}
