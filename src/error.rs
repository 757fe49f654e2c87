use thiserror::Error;

/// Error type for the grouping stage's own checks.
///
/// Grouping itself is total over well-formed input; the only failures it reports are
/// configuration problems. Collaborator errors are never converted into this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),
}

/// Failure building a [`crate::group::GroupResultSet`].
///
/// `Upstream` carries the series cursor's error value exactly as it was returned.
#[derive(Error, Debug)]
pub enum BuildError<E> {
    #[error(transparent)]
    Config(#[from] GroupError),
    #[error("{0}")]
    Upstream(#[source] E),
}

impl<E> BuildError<E> {
    /// Returns the upstream error, if that is what failed.
    pub fn into_upstream(self) -> Option<E> {
        match self {
            BuildError::Upstream(e) => Some(e),
            BuildError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Error, Debug, PartialEq, Eq)]
    #[error("fetch failed: {0}")]
    struct FetchError(u32);

    #[test]
    fn upstream_error_displays_and_chains_unchanged() {
        let err: BuildError<FetchError> = BuildError::Upstream(FetchError(7));
        assert_eq!(err.to_string(), "fetch failed: 7");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("fetch failed: 7"));
        assert_eq!(err.into_upstream(), Some(FetchError(7)));
    }

    #[test]
    fn config_error_converts_and_displays_transparently() {
        let err: BuildError<FetchError> = GroupError::ConfigError("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration Error: bad");
        assert!(matches!(err, BuildError::Config(GroupError::ConfigError(_))));
        assert!(err.into_upstream().is_none());
    }
}
