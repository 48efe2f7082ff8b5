//! In-memory store configuration.
//!
//! Controls region capacity and region provisioning via `domaincache.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::domain::types::EntityType;

const DEFAULT_REGION_CAPACITY: usize = 1000;

/// Configuration of the bundled [`InMemoryStore`](super::InMemoryStore).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum entries per region before LRU eviction.
    pub region_capacity: usize,
    /// Create a region the first time an unknown entity type asks for one.
    pub create_missing_regions: bool,
    /// Regions created up front.
    pub regions: Vec<EntityType>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region_capacity: DEFAULT_REGION_CAPACITY,
            create_missing_regions: true,
            regions: Vec::new(),
        }
    }
}

impl From<&crate::config::StoreSettings> for StoreConfig {
    fn from(settings: &crate::config::StoreSettings) -> Self {
        Self {
            region_capacity: settings.region_capacity.get(),
            create_missing_regions: settings.create_missing_regions,
            regions: settings.regions.clone(),
        }
    }
}

impl StoreConfig {
    /// Returns the region capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn region_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.region_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Store with only the listed regions; unknown regions resolve to absent.
    pub fn fixed(regions: impl IntoIterator<Item = impl Into<EntityType>>) -> Self {
        Self {
            create_missing_regions: false,
            regions: regions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.region_capacity, 1000);
        assert!(config.create_missing_regions);
        assert!(config.regions.is_empty());
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = StoreConfig {
            region_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.region_capacity_non_zero().get(), 1);
    }

    #[test]
    fn fixed_disables_lazy_regions() {
        let config = StoreConfig::fixed(["Invoice", "Customer"]);
        assert!(!config.create_missing_regions);
        assert_eq!(
            config.regions,
            vec![EntityType::new("Invoice"), EntityType::new("Customer")]
        );
    }
}
