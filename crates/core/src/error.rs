//! Error types for the content pipeline.

use thiserror::Error;

/// Why a tile's content could not be produced
///
/// Load errors never leave the tile layer: the engine logs them and leaves the
/// tile without content so neighbouring cells keep laying out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to fetch content for {key}: {reason}")]
    Fetch { key: String, reason: String },

    #[error("content for {key} could not be decoded: {reason}")]
    Decode { key: String, reason: String },

    #[error("load was cancelled")]
    Cancelled,
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::Fetch {
            key: "3,-2".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(err.to_string(), "failed to fetch content for 3,-2: timed out");
        assert_eq!(LoadError::Cancelled.to_string(), "load was cancelled");
    }
}
