//! Topic identifiers and their fixed endpoint paths
//!
//! Every streaming connection is bound to exactly one [`Topic`]. The set of
//! topics is closed: dispatch, registry lookups and reconnection all key off
//! this enumeration instead of free-form endpoint strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical stream served by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Session and usage analytics
    Analytics,
    /// Cluster membership and state
    Clusters,
    /// Host-level system metrics
    System,
}

impl Topic {
    /// All topics, in the order `connect()` starts them
    pub const ALL: [Topic; 3] = [Topic::Analytics, Topic::Clusters, Topic::System];

    /// Relative endpoint path for this topic's stream
    pub fn endpoint_path(self) -> &'static str {
        match self {
            Topic::Analytics => "/analytics",
            Topic::Clusters => "/clusters",
            Topic::System => "/system",
        }
    }

    /// Stable lowercase name, used in logs and on the CLI
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Analytics => "analytics",
            Topic::Clusters => "clusters",
            Topic::System => "system",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known topic
#[derive(Debug, Error, PartialEq)]
#[error("Unknown topic: '{0}'")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    /// Accepts the bare name or the endpoint path, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed.trim_start_matches('/');
        match name.to_ascii_lowercase().as_str() {
            "analytics" => Ok(Topic::Analytics),
            "clusters" => Ok(Topic::Clusters),
            "system" => Ok(Topic::System),
            _ => Err(UnknownTopic(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Topic::Analytics.endpoint_path(), "/analytics");
        assert_eq!(Topic::Clusters.endpoint_path(), "/clusters");
        assert_eq!(Topic::System.endpoint_path(), "/system");
    }

    #[test]
    fn test_parse_accepts_name_and_path() {
        assert_eq!("analytics".parse::<Topic>(), Ok(Topic::Analytics));
        assert_eq!("/clusters".parse::<Topic>(), Ok(Topic::Clusters));
        assert_eq!(" SYSTEM ".parse::<Topic>(), Ok(Topic::System));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "metrics".parse::<Topic>().unwrap_err();
        assert_eq!(err, UnknownTopic("metrics".to_string()));
        assert!("".parse::<Topic>().is_err());
    }

    #[test]
    fn test_all_topics_are_distinct() {
        let mut paths: Vec<_> = Topic::ALL.iter().map(|t| t.endpoint_path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), Topic::ALL.len());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Topic::Clusters).unwrap();
        assert_eq!(json, "\"clusters\"");
        let parsed: Topic = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(parsed, Topic::System);
    }
}
