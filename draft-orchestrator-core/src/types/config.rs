//! Application configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Device class the app runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceSystem {
    #[default]
    Desktop,
    Tablet,
    Phone,
}

impl DeviceSystem {
    pub fn is_phone(self) -> bool {
        self == Self::Phone
    }
}

/// User-facing texts produced by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiTexts {
    pub page_not_found: String,
    pub no_data: String,
    pub no_data_after_search: String,
    pub product_not_available: String,
    pub draft_not_available: String,
    pub product_deleted: String,
    pub draft_discarded: String,
    pub product_saved: String,
    pub metadata_failed: String,
}

impl Default for UiTexts {
    fn default() -> Self {
        Self {
            page_not_found: "The requested page could not be found".to_string(),
            no_data: "No products are currently available".to_string(),
            no_data_after_search: "No matching products found".to_string(),
            product_not_available: "The product is no longer available".to_string(),
            draft_not_available: "The draft is no longer available".to_string(),
            product_deleted: "Product has been deleted".to_string(),
            draft_discarded: "Your draft has been discarded".to_string(),
            product_saved: "Product has been saved".to_string(),
            metadata_failed: "The service is currently not available".to_string(),
        }
    }
}

/// Configuration of an application instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub device: DeviceSystem,
    /// Name of the signed-in user, used for draft ownership checks
    pub current_user: String,
    /// Sort path applied when no sorter is chosen
    pub default_sort: String,
    pub texts: UiTexts,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceSystem::Desktop,
            current_user: String::new(),
            default_sort: "Name".to_string(),
            texts: UiTexts::default(),
        }
    }
}

impl AppConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::ConfigError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_json_str(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn is_phone(&self) -> bool {
        self.device.is_phone()
    }

    fn validate(&self) -> CoreResult<()> {
        if self.default_sort.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "defaultSort must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
