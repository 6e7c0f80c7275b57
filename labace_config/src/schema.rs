use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use labace_core::{ClassificationRules, PipelineConfig};
use tracing::info;

const CONFIG_TEMPLATE: &str = r#"{
  "oracle": {
    "provider": "hosted",
    "api_key": "your-anthropic-api-key-here",
    "model": "claude-3-haiku-20240307",
    "temperature_default": 0.1,
    "timeout_secs": 120
  },
  "pipeline": {
    "max_retries": 3,
    "reflection_temperature": 0.3,
    "note_excerpt_chars": 1500,
    "playbook_capacity": 10,
    "ambiguity_policy": "annotate"
  }
}"#;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub oracle: OracleConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub curator: CuratorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Hosted,
    Local,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OracleConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "OracleConfig::default_temperature")]
    pub temperature_default: f32,
    /// Full chat URL for the local backend, base URL for the hosted one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default = "OracleConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl OracleConfig {
    const fn default_temperature() -> f32 {
        0.1
    }

    const fn default_timeout_secs() -> u64 {
        120
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CuratorConfig {
    #[serde(default)]
    pub rules: ClassificationRules,
}

impl Config {
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("labace")
            .join("config.json"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'labace init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("labace");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your Anthropic API key");
        println!("      (or set provider to \"local\" and endpoint_url to your Ollama chat URL)");
        println!("   2. Run 'labace run notes.json' to process a batch of notes");
        println!();
        println!("🔧 Configuration options:");
        println!("   - oracle.model: model name for the selected backend");
        println!("   - pipeline.playbook_capacity: strategies kept per playbook category");
        println!("   - pipeline.ambiguity_policy: \"annotate\" or \"exclude\" for tied dates");
        println!("   - curator.rules: keyword table used to file learned patterns");
        println!();
        Ok(())
    }

    /// Core pipeline tunables. Extraction and recency run at the oracle's
    /// default temperature.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            temperature: self.oracle.temperature_default,
            ..self.pipeline.clone()
        }
    }

    #[must_use]
    pub fn curator_rules(&self) -> ClassificationRules {
        self.curator.rules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labace_core::{AmbiguityPolicy, Category};

    #[test]
    fn template_parses_with_defaults() -> anyhow::Result<()> {
        let config: Config = serde_json::from_str(CONFIG_TEMPLATE)?;

        assert_eq!(config.oracle.provider, ProviderKind::Hosted);
        assert_eq!(config.oracle.timeout(), Duration::from_secs(120));
        assert_eq!(config.curator_rules(), ClassificationRules::default());

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.max_retries, 3);
        assert_eq!(pipeline.playbook_capacity, 10);
        assert_eq!(pipeline.note_excerpt_chars, 1500);
        assert_eq!(pipeline.ambiguity_policy, AmbiguityPolicy::Annotate);
        Ok(())
    }

    #[test]
    fn minimal_local_config() -> anyhow::Result<()> {
        let config: Config = serde_json::from_str(
            r#"{"oracle": {"provider": "local", "endpoint_url": "http://gpu-box:11434/api/chat"}}"#,
        )?;

        assert_eq!(config.oracle.provider, ProviderKind::Local);
        assert!(config.oracle.api_key.is_empty());
        assert!(config.oracle.model.is_none());
        assert!((config.oracle.temperature_default - 0.1).abs() < f32::EPSILON);
        assert!((config.pipeline.reflection_temperature - 0.3).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn overrides_reach_core_types() -> anyhow::Result<()> {
        let config: Config = serde_json::from_str(
            r#"{
                "oracle": {"provider": "hosted", "api_key": "k", "temperature_default": 0.0},
                "pipeline": {"max_retries": 5, "playbook_capacity": 4, "ambiguity_policy": "exclude"},
                "curator": {"rules": [{"category": "formatting_patterns", "keywords": ["units"]}]}
            }"#,
        )?;

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.max_retries, 5);
        assert_eq!(pipeline.playbook_capacity, 4);
        assert_eq!(pipeline.ambiguity_policy, AmbiguityPolicy::Exclude);
        assert!(pipeline.temperature.abs() < f32::EPSILON);

        let rules = config.curator_rules();
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.classify("Keep units verbatim"), Some(Category::Formatting));
        assert_eq!(rules.classify("Check the table"), None);
        Ok(())
    }

    #[test]
    fn partial_pipeline_section_keeps_core_defaults() -> anyhow::Result<()> {
        let config: Config = serde_json::from_str(
            r#"{
                "oracle": {"provider": "local", "temperature_default": 0.2},
                "pipeline": {"note_excerpt_chars": 400, "temperature": 0.9}
            }"#,
        )?;

        let pipeline = config.pipeline_config();
        let defaults = PipelineConfig::default();
        assert_eq!(pipeline.note_excerpt_chars, 400);
        assert_eq!(pipeline.max_retries, defaults.max_retries);
        assert_eq!(pipeline.playbook_capacity, defaults.playbook_capacity);
        assert_eq!(pipeline.ambiguity_policy, AmbiguityPolicy::Annotate);
        let reflection_drift = pipeline.reflection_temperature - defaults.reflection_temperature;
        assert!(reflection_drift.abs() < f32::EPSILON);
        assert!((pipeline.temperature - 0.2).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let parsed = serde_json::from_str::<Config>(r#"{"oracle": {"provider": "azure"}}"#);
        assert!(parsed.is_err());
    }
}
