use labace_config::{Config, ProviderKind};
use labace_providers::{anthropic, ollama};

/// Prints the loaded configuration with the API key masked.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let oracle = &config.oracle;

        println!("=== labace Configuration ===\n");

        println!("Oracle:");
        match oracle.provider {
            ProviderKind::Hosted => {
                println!("  Provider: hosted (Anthropic)");
                println!("  API Key: {}", mask_key(&oracle.api_key));
                println!(
                    "  Model: {}",
                    oracle.model.as_deref().unwrap_or(anthropic::DEFAULT_MODEL)
                );
                println!(
                    "  Base URL: {}",
                    oracle
                        .endpoint_url
                        .as_deref()
                        .unwrap_or(anthropic::DEFAULT_BASE_URL)
                );
            }
            ProviderKind::Local => {
                println!("  Provider: local");
                println!(
                    "  Model: {}",
                    oracle.model.as_deref().unwrap_or(ollama::DEFAULT_MODEL)
                );
                println!(
                    "  Endpoint: {}",
                    oracle
                        .endpoint_url
                        .as_deref()
                        .unwrap_or(ollama::DEFAULT_ENDPOINT)
                );
            }
        }
        println!("  Temperature: {}", oracle.temperature_default);
        println!("  Timeout: {}s", oracle.timeout_secs);
        println!();

        let pipeline = config.pipeline_config();
        println!("Pipeline:");
        println!("  Max Retries: {}", pipeline.max_retries);
        println!("  Reflection Temperature: {}", pipeline.reflection_temperature);
        println!("  Note Excerpt: {} chars", pipeline.note_excerpt_chars);
        println!("  Playbook Capacity: {} per category", pipeline.playbook_capacity);
        println!("  Ambiguity Policy: {:?}", pipeline.ambiguity_policy);
        println!();

        println!("Curator Rules:");
        for rule in config.curator.rules.rules() {
            println!(
                "  {}: {}",
                rule.category,
                truncate(&rule.keywords.join(", "), 60)
            );
        }

        Ok(())
    }
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
