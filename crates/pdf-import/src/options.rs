use crate::constants::DEFAULT_TEMPLATE_PREFIX;
use crate::types::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How repeated imports of a page are recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CachePolicy {
    /// Same document, page and box return the same template
    #[default]
    PageAndBox,
    /// Same document and page return the same template, whatever box is requested
    PageOnly,
}

/// Object numbering used by [`crate::Importer::export`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IdMode {
    /// Dense integers starting at the writer's next object id
    #[default]
    Sequential,
    /// SHA-1 fingerprints, renumbered by the host after merging
    ContentHash,
}

/// Importer configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ImportOptions {
    /// Resource name prefix for templates (`TPL` gives `TPL0`, `TPL1`, ...)
    pub template_prefix: String,
    pub cache_policy: CachePolicy,
    /// Flate-compress template content streams
    pub compress_templates: bool,
    pub id_mode: IdMode,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            template_prefix: DEFAULT_TEMPLATE_PREFIX.to_string(),
            cache_policy: CachePolicy::PageAndBox,
            compress_templates: true,
            id_mode: IdMode::Sequential,
        }
    }
}

impl ImportOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ImportError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ImportError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.template_prefix.is_empty() {
            return Err(ImportError::Config(
                "Template prefix must not be empty".to_string(),
            ));
        }

        // The prefix ends up inside a PDF name token, so it has to be plain
        if let Some(c) = self
            .template_prefix
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-' && *c != '.')
        {
            return Err(ImportError::Config(format!(
                "Template prefix contains unsupported character {:?}",
                c
            )));
        }

        Ok(())
    }
}
