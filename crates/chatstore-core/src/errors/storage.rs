// ABOUTME: Storage tier error types for hot (cache) and cold (history) operations
// ABOUTME: Classifies failures as connectivity, serialization, query, or unavailable tier
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::error::Error;
use std::fmt;

/// Which storage tier produced an error
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Low-latency session cache
    Hot,
    /// Durable conversation history
    Cold,
}

impl Tier {
    /// Stable lowercase name used in log fields
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Cold => "cold",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by session (hot) and history (cold) stores
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The tier could not be reached (transport failure, timeout, closed pool)
    #[error("{tier} tier unreachable: {message}")]
    Connectivity {
        /// Tier that failed
        tier: Tier,
        /// Failure description
        message: String,
        /// Underlying client error
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },

    /// A stored entry could not be encoded or decoded
    #[error("Serialization failed for {context}")]
    Serialization {
        /// What was being (de)serialized
        context: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The tier was reachable but rejected the operation
    #[error("{tier} tier query failed: {message}")]
    Query {
        /// Tier that failed
        tier: Tier,
        /// Failure description
        message: String,
    },

    /// No collaborator is configured for this tier
    #[error("{tier} tier is not available")]
    Unavailable {
        /// Tier that is missing
        tier: Tier,
    },
}

impl StorageError {
    /// Connectivity failure without an underlying source
    pub fn connectivity(tier: Tier, message: impl Into<String>) -> Self {
        Self::Connectivity {
            tier,
            message: message.into(),
            source: None,
        }
    }

    /// Connectivity failure wrapping the client error
    pub fn connectivity_from(tier: Tier, source: impl Error + Send + Sync + 'static) -> Self {
        Self::Connectivity {
            tier,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Serialization failure
    #[must_use]
    pub const fn serialization(context: &'static str, source: serde_json::Error) -> Self {
        Self::Serialization { context, source }
    }

    /// Query failure
    pub fn query(tier: Tier, message: impl Into<String>) -> Self {
        Self::Query {
            tier,
            message: message.into(),
        }
    }

    /// True when the tier itself could not be reached
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Unavailable { .. })
    }

    /// True when the failure should degrade to a miss rather than an error
    #[must_use]
    pub const fn is_soft_miss(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Tier the error is attributed to, when known
    #[must_use]
    pub const fn tier(&self) -> Option<Tier> {
        match self {
            Self::Connectivity { tier, .. } | Self::Query { tier, .. } | Self::Unavailable { tier } => {
                Some(*tier)
            }
            Self::Serialization { .. } => None,
        }
    }
}

/// Result type for storage tier operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = StorageError::connectivity(Tier::Hot, "refused");
        assert!(err.is_connectivity());
        assert!(!err.is_soft_miss());
        assert_eq!(err.tier(), Some(Tier::Hot));

        let json_err = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err = StorageError::serialization("session turns", json_err);
        assert!(err.is_soft_miss());
        assert_eq!(err.tier(), None);
        assert_eq!(err.to_string(), "Serialization failed for session turns");
    }

    #[test]
    fn test_unavailable_counts_as_connectivity() {
        let err = StorageError::Unavailable { tier: Tier::Cold };
        assert!(err.is_connectivity());
        assert_eq!(err.to_string(), "cold tier is not available");
    }
}
