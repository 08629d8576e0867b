//! Capacity manager: the sole arbiter of the shared backend budget.

use crate::backend::Backend;
use crate::error::{Result, StoreError};
use crate::evict::EvictionReport;
use crate::store::PodStore;
use serde::Serialize;

/// Backend usage against the configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Usage {
    pub used: u64,
    pub ceiling: u64,
    pub ratio: f64,
    pub near_full: bool,
}

impl<B: Backend> PodStore<B> {
    /// Sum of key and value lengths over every stored key.
    pub fn estimate_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for key in self.backend.keys()? {
            let value_len = self.backend.get(&key)?.map(|v| v.len()).unwrap_or(0);
            total += (key.len() + value_len) as u64;
        }
        Ok(total)
    }

    pub fn will_fit(&self, additional: u64) -> Result<bool> {
        Ok(self.estimate_size()? + additional <= self.config.ceiling_bytes)
    }

    pub fn usage(&self) -> Result<Usage> {
        let used = self.estimate_size()?;
        let ceiling = self.config.ceiling_bytes;
        let ratio = if ceiling == 0 {
            1.0
        } else {
            used as f64 / ceiling as f64
        };
        Ok(Usage {
            used,
            ceiling,
            ratio,
            near_full: ratio > self.config.warn_ratio,
        })
    }

    pub fn is_near_full(&self) -> Result<bool> {
        Ok(self.usage()?.near_full)
    }

    /// Make room for a pending write of `additional(store)` bytes.
    ///
    /// If it does not fit, runs the retention sweep once and measures again
    /// (the pending write may itself shrink once evicted data is gone).
    /// Still over the ceiling: `CapacityExceeded`, nothing written.
    /// Returns the sweep report when eviction ran.
    pub fn ensure_capacity<F>(
        &mut self,
        collection: &'static str,
        mut additional: F,
    ) -> Result<Option<EvictionReport>>
    where
        F: FnMut(&Self) -> Result<u64>,
    {
        let needed = additional(self)?;
        // Writes that do not grow storage always go through.
        if needed == 0 || self.will_fit(needed)? {
            return Ok(None);
        }
        tracing::warn!(
            collection,
            needed,
            ceiling = self.config.ceiling_bytes,
            "write does not fit; running eviction"
        );
        let report = self.sweep()?;
        let needed = additional(self)?;
        let used = self.estimate_size()?;
        if used + needed > self.config.ceiling_bytes {
            return Err(StoreError::CapacityExceeded {
                collection,
                required: used + needed,
                ceiling: self.config.ceiling_bytes,
                evicted: report.history_removed.len(),
            });
        }
        Ok(Some(report))
    }
}
