use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::ProviderKey;

/// Failure cached on a provider node or returned from a graph operation.
///
/// Cloneable so one failed computation can be handed to every watcher.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider's computation returned an error.
    #[error("{0:#}")]
    Failed(Arc<anyhow::Error>),
    /// Reading the provider would make it (transitively) depend on itself.
    #[error("circular dependency detected while reading `{key}`")]
    CircularDependency { key: String },
    /// The owning container was dropped while the computation was pending.
    #[error("provider container was dropped")]
    ContainerDropped,
}

impl ProviderError {
    pub(crate) fn cycle(key: &ProviderKey) -> Self {
        Self::CircularDependency {
            key: key.to_string(),
        }
    }

    /// Finds an error of type `E` behind this one, looking through errors
    /// that were re-raised by dependent providers.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self {
            Self::Failed(err) => err.downcast_ref::<E>().or_else(|| {
                err.downcast_ref::<ProviderError>()
                    .and_then(ProviderError::downcast_ref::<E>)
            }),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ProviderError>() {
            // re-raised by a dependent; keep the original
            Ok(inner) => inner,
            Err(err) => Self::Failed(Arc::new(err)),
        }
    }
}
