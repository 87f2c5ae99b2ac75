use ddpack_codec::{BlockLayout, CodecError, EncoderConfig, IdWidth, LookupStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Block layout and encoder settings, loadable from a TOML or JSON file.
///
/// ```toml
/// fields = [2, 2, 2, 4, 2, 4]
/// deviation_positions = [0, 2, 4, 6, 7, 10, 12, 13]  # optional, low half if absent
/// id_width = "one"
/// lookup = "linear"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub fields: Vec<u32>,
    #[serde(default)]
    pub deviation_positions: Option<Vec<u32>>,
    #[serde(default)]
    pub id_width: IdWidth,
    #[serde(default)]
    pub lookup: LookupStrategy,
}

impl LayoutConfig {
    pub fn new(fields: Vec<u32>, deviation_positions: Option<Vec<u32>>) -> Self {
        Self {
            fields,
            deviation_positions,
            id_width: IdWidth::default(),
            lookup: LookupStrategy::default(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: LayoutConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: LayoutConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Validated block layout; positions default to the low-half rule.
    pub fn layout(&self) -> Result<BlockLayout, CodecError> {
        match &self.deviation_positions {
            Some(positions) => BlockLayout::new(self.fields.clone(), positions.clone()),
            None => BlockLayout::low_half(self.fields.clone()),
        }
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            id_width: self.id_width,
            lookup: self.lookup,
        }
    }
}
