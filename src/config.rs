use std::io::Read;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Annotation convention of the analysed code base.
///
/// Decides which value an absent property takes on an entity whose source
/// is not available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationMode {
    /// Absence means the weakest claim.
    #[default]
    Defensive,
    /// Absence means the strongest claim for final, container and independent.
    Offensive,
}

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub annotation_mode: AnnotationMode,
    /// Upper bound on fixpoint passes before reporting the run as still delayed.
    pub max_passes: usize,
    /// Analyse the entities of one pass on the rayon pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            annotation_mode: AnnotationMode::Defensive,
            max_passes: 10,
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let config: EngineConfig = serde_path_to_error::deserialize(&mut deserializer)
            .context("parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        let config: EngineConfig = serde_path_to_error::deserialize(&mut deserializer)
            .context("read engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_passes == 0 {
            anyhow::bail!("max_passes must be at least 1");
        }
        Ok(())
    }
}
