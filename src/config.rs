use crate::application::guard::GuardPolicy;
use crate::application::template::TemplatePolicy;
use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Engine settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub guard: GuardPolicy,
    pub template_policy: TemplatePolicy,
}

impl EngineConfig {
    /// Loads a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
