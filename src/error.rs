use thiserror::Error;

/// Main error type of the binder.
/// Aggregates errors from dependencies and internal modules.
#[derive(Error, Debug)]
pub enum BinderError {
    #[error("{0}")]
    WithContextError(String),

    // Third-party library errors
    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    YamlError(#[from] serde_yaml::Error),

    // Grid module errors
    #[error("{0}")]
    GridError(#[from] crate::grid::GridError),

    // Table module errors
    #[error("{0}")]
    TableError(#[from] crate::table::TableError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, BinderError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| BinderError::WithContextError(format!("{}: {}", message, e)))
    }
}
