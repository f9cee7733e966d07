//! Construction parameters for a shared-memory disruptor handle.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RingError};

/// Validated geometry and role for constructing a [`crate::Disruptor`]
/// handle.
///
/// `Serialize`/`Deserialize` let an initializer ship the agreed-upon
/// geometry to joining processes out-of-band (env var, argv, a small
/// sidecar file): the shared region itself carries no geometry header,
/// so agreement has to happen through a channel like this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptorConfig {
    /// POSIX shared-memory object name (leading slash convention).
    pub shm_name: String,
    /// Number of element slots in the ring (`N_e`).
    pub num_elements: u32,
    /// Size in bytes of each element slot (`S`).
    pub element_size: u32,
    /// Number of consumers (`N_c`).
    pub num_consumers: u32,
    /// This handle's consumer index (`[0, num_consumers)`); required even
    /// for pure-producer handles, but otherwise unused by them.
    pub consumer_index: u32,
    /// Whether this handle creates (and truncates/zero-fills) the region.
    pub init: bool,
    /// Whether operations retry internally on contention (`spin`) or return
    /// immediately (`non-spin`).
    pub spin: bool,
}

impl DisruptorConfig {
    /// Start building a config for the given shared-memory object name and
    /// ring geometry.
    pub fn new(shm_name: impl Into<String>, num_elements: u32, element_size: u32) -> Self {
        Self {
            shm_name: shm_name.into(),
            num_elements,
            element_size,
            num_consumers: 1,
            consumer_index: 0,
            init: false,
            spin: false,
        }
    }

    /// Set the number of consumers and this handle's consumer index.
    pub fn with_consumer(mut self, num_consumers: u32, consumer_index: u32) -> Self {
        self.num_consumers = num_consumers;
        self.consumer_index = consumer_index;
        self
    }

    /// Mark this handle as the one that creates (and zero-fills) the region.
    pub fn with_init(mut self, init: bool) -> Self {
        self.init = init;
        self
    }

    /// Select spin (cooperative retry) vs. non-spin (immediate-return) mode.
    pub fn with_spin(mut self, spin: bool) -> Self {
        self.spin = spin;
        self
    }

    /// Validate the geometry. Construction of the handle
    /// itself calls this; exposed separately so hosts can fail fast before
    /// attempting any syscalls.
    pub fn validate(&self) -> Result<()> {
        if self.shm_name.is_empty() {
            return Err(RingError::config("shm_name must not be empty"));
        }
        if self.num_elements == 0 {
            return Err(RingError::config("num_elements must be at least 1"));
        }
        if self.element_size == 0 {
            return Err(RingError::config("element_size must be at least 1"));
        }
        if self.num_consumers == 0 {
            return Err(RingError::config("num_consumers must be at least 1"));
        }
        if self.consumer_index >= self.num_consumers {
            return Err(RingError::config(format!(
                "consumer_index {} out of range for num_consumers {}",
                self.consumer_index, self.num_consumers
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_fields() {
        let cfg = DisruptorConfig::new("/ring-test", 1024, 64)
            .with_consumer(3, 1)
            .with_init(true)
            .with_spin(true);

        assert_eq!(cfg.shm_name, "/ring-test");
        assert_eq!(cfg.num_elements, 1024);
        assert_eq!(cfg.element_size, 64);
        assert_eq!(cfg.num_consumers, 3);
        assert_eq!(cfg.consumer_index, 1);
        assert!(cfg.init);
        assert!(cfg.spin);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_geometry() {
        assert!(DisruptorConfig::new("/x", 0, 1).validate().is_err());
        assert!(DisruptorConfig::new("/x", 1, 0).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_consumer_index() {
        let cfg = DisruptorConfig::new("/x", 4, 1).with_consumer(2, 2);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(DisruptorConfig::new("", 4, 1).validate().is_err());
    }

    #[test]
    fn serde_round_trips() {
        let cfg = DisruptorConfig::new("/ring-test", 8, 4)
            .with_consumer(3, 1)
            .with_init(true)
            .with_spin(true);

        let json = serde_json::to_string(&cfg).unwrap();
        let decoded: DisruptorConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.shm_name, cfg.shm_name);
        assert_eq!(decoded.num_elements, cfg.num_elements);
        assert_eq!(decoded.element_size, cfg.element_size);
        assert_eq!(decoded.num_consumers, cfg.num_consumers);
        assert_eq!(decoded.consumer_index, cfg.consumer_index);
        assert_eq!(decoded.init, cfg.init);
        assert_eq!(decoded.spin, cfg.spin);
    }
}
