//! Process-wide default type provider.
//!
//! The default may be installed once, typically at startup. Contexts built
//! with [`CompileContext::default`](crate::CompileContext) read it.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::context::CustomTypeProvider;

static DEFAULT_PROVIDER: OnceCell<Arc<dyn CustomTypeProvider>> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("the default custom type provider is already set")]
    AlreadyInitialized,
}

/// Installs the process default provider. Fails if one is already set.
pub fn set_default_provider(provider: Arc<dyn CustomTypeProvider>) -> Result<(), ConfigError> {
    DEFAULT_PROVIDER
        .set(provider)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    debug!("installed default custom type provider");
    Ok(())
}

pub fn default_provider() -> Option<&'static Arc<dyn CustomTypeProvider>> {
    DEFAULT_PROVIDER.get()
}
