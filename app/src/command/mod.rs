//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use labace_config::{Config, ProviderKind};
use labace_core::LLMProvider;
use labace_providers::{AnthropicProvider, OllamaProvider};
use tracing::info;

mod info;
mod init;
mod report;
mod run;
mod version;

pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use run::{RunInput, RunStrategy};
pub use version::VersionStrategy;

/// Contract shared by all command strategies.
///
/// Each strategy defines its own input type through the associated type, so
/// parameters are passed without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Build the backend selected in the oracle section.
fn build_provider(config: &Config) -> anyhow::Result<Box<dyn LLMProvider>> {
    let oracle = &config.oracle;
    match oracle.provider {
        ProviderKind::Hosted => {
            if oracle.api_key.is_empty() {
                anyhow::bail!("oracle.api_key is required for the hosted provider");
            }
            let mut provider = AnthropicProvider::new(oracle.api_key.clone())?
                .with_timeout(oracle.timeout())?;
            if let Some(model) = &oracle.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(url) = &oracle.endpoint_url {
                provider = provider.with_base_url(url.clone());
            }
            info!("Using hosted oracle: {}", provider.model());
            Ok(Box::new(provider))
        }
        ProviderKind::Local => {
            let mut provider = OllamaProvider::new()?.with_timeout(oracle.timeout())?;
            if let Some(model) = &oracle.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(url) = &oracle.endpoint_url {
                provider = provider.with_endpoint(url.clone());
            }
            info!("Using local oracle: {}", provider.model());
            Ok(Box::new(provider))
        }
    }
}
