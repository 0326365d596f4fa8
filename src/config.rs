use crate::features::PageContext;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_rules_path() -> String {
    "rules/scamRules.json".to_string()
}

fn default_debounce_ms() -> u64 {
    750
}

fn default_ui_root_id() -> String {
    "vigilant-sidebar-root".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_rules_path")]
    pub rules_path: String,
    /// Quiet period after the last change before a rescan.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// `id` of the engine's own UI root; never scanned, never a trigger.
    #[serde(default = "default_ui_root_id")]
    pub ui_root_id: String,
    /// URL of the monitored page. Supplies the transport scheme and the base
    /// for relative links.
    #[serde(default)]
    pub page_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rules_path: default_rules_path(),
            debounce_ms: default_debounce_ms(),
            ui_root_id: default_ui_root_id(),
            page_url: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn page_context(&self) -> PageContext {
        PageContext::from_str_lossy(self.page_url.as_deref())
    }
}
