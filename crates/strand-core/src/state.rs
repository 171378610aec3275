use crate::ProviderError;

/// Observable state of an asynchronous provider.
#[derive(Clone, Debug)]
pub enum ProviderState<T> {
    Loading,
    Data(T),
    Error(ProviderError),
}

impl<T> ProviderState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProviderState<U> {
        match self {
            Self::Loading => ProviderState::Loading,
            Self::Data(v) => ProviderState::Data(f(v)),
            Self::Error(e) => ProviderState::Error(e),
        }
    }

    /// Data, or `T::default()` while loading or failed.
    ///
    /// Derived views use this so they never surface Loading/Error themselves;
    /// the upstream failure is only logged.
    pub fn data_or_default(self) -> T
    where
        T: Default,
    {
        match self {
            Self::Data(v) => v,
            Self::Loading => T::default(),
            Self::Error(e) => {
                log::debug!("derived view collapsing upstream error to default: {e}");
                T::default()
            }
        }
    }
}

impl<T> From<Result<T, ProviderError>> for ProviderState<T> {
    fn from(res: Result<T, ProviderError>) -> Self {
        match res {
            Ok(v) => Self::Data(v),
            Err(e) => Self::Error(e),
        }
    }
}

/// Lifecycle position of a node, as seen by inspection.
///
/// Disposed nodes are removed from the graph, so they report no status at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Uninitialized,
    Loading,
    Data,
    Error,
}
