//! Call records, statuses and AI-generated call analyses.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier of a monitored call.
///
/// The backend issues numeric ids, but the realtime client treats them as
/// opaque correlation keys. Deserializes from either a JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Creates a new CallId without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses a call id supplied by a user or a URL segment.
    ///
    /// The id ends up as a path segment in the connection URL, so empty ids
    /// and ids containing URL delimiters are rejected.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidCallId {
                value: s.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| matches!(c, '/' | '?' | '#' | '&') || c.is_whitespace())
        {
            return Err(DomainError::InvalidCallId {
                value: s.to_string(),
                reason: format!("contains reserved character {c:?}"),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CallId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CallId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CallId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCallId {
            Number(u64),
            Text(String),
        }

        Ok(match RawCallId::deserialize(deserializer)? {
            RawCallId::Number(n) => Self::from(n),
            RawCallId::Text(s) => Self(s),
        })
    }
}

// ============================================================================
// Call Status
// ============================================================================

/// Lifecycle status of a call as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Planned for a future time.
    #[default]
    Scheduled,

    /// Conversation is live.
    InProgress,

    /// Ended normally. Analysis is produced asynchronously afterwards.
    Completed,

    /// Ended because of an error.
    Failed,

    /// Cancelled by a caregiver or the system.
    Cancelled,

    /// The care recipient never picked up.
    Missed,
}

impl CallStatus {
    /// Returns true for statuses after which an analysis is expected.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Missed => "missed",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "missed" => Ok(Self::Missed),
            other => Err(DomainError::InvalidFieldValue {
                field: "status".to_string(),
                value: other.to_string(),
                expected: "scheduled|in_progress|completed|failed|cancelled|missed".to_string(),
            }),
        }
    }
}

// ============================================================================
// Call Analysis
// ============================================================================

/// Risk classification produced by the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Returns the display label for this risk level.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// AI-generated analysis of a finished call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAnalysis {
    pub risk_level: RiskLevel,
    pub sentiment_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub health_mentions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
}

// ============================================================================
// Call Record
// ============================================================================

/// Where a call stands with respect to its analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    /// The call has not ended yet; no analysis is expected.
    NotExpected,

    /// The call ended but the analysis is not available yet.
    Pending,

    /// The analysis is attached to the record.
    Ready,
}

/// A call as returned by the calls REST resource.
///
/// Only the fields the monitor relies on are modelled; unknown fields
/// are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elderly_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elderly_name: Option<String>,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub is_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<CallAnalysis>,
}

impl CallRecord {
    /// Returns true once an analysis is attached.
    #[must_use]
    pub fn has_analysis(&self) -> bool {
        self.analysis.is_some()
    }

    /// Classifies the record's analysis availability.
    #[must_use]
    pub fn analysis_state(&self) -> AnalysisState {
        match (&self.analysis, self.status.is_terminal()) {
            (Some(_), _) => AnalysisState::Ready,
            (None, true) => AnalysisState::Pending,
            (None, false) => AnalysisState::NotExpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_from_number_and_string() {
        let from_num: CallId = serde_json::from_str("42").unwrap();
        let from_str: CallId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(from_num.as_str(), "42");
        assert_eq!(serde_json::to_string(&from_num).unwrap(), "\"42\"");
    }

    #[test]
    fn test_call_id_parse_rejects_reserved() {
        assert!(CallId::parse("  ").is_err());
        assert!(CallId::parse("12/34").is_err());
        assert!(CallId::parse("12?x=1").is_err());
        assert_eq!(CallId::parse(" 17 ").unwrap().as_str(), "17");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(CallStatus::Cancelled.is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
        assert!(!CallStatus::Scheduled.is_terminal());
        assert!(!CallStatus::Missed.is_terminal());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("in_progress".parse::<CallStatus>().unwrap(), CallStatus::InProgress);
        let err = "done".parse::<CallStatus>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidFieldValue { .. }));
    }

    #[test]
    fn test_record_analysis_state() {
        let json = r#"{
            "id": 7,
            "elderly_id": 3,
            "call_type": "voice",
            "status": "completed",
            "is_successful": true,
            "created_at": "2025-01-15T10:00:00"
        }"#;
        let mut record: CallRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, CallId::from(7));
        assert_eq!(record.analysis_state(), AnalysisState::Pending);

        record.analysis = Some(CallAnalysis {
            risk_level: RiskLevel::Medium,
            sentiment_score: 0.2,
            summary: Some("Mentioned knee pain".to_string()),
            key_topics: vec!["health".to_string()],
            recommendations: Vec::new(),
            health_mentions: vec!["knee".to_string()],
            emotional_state: None,
            analyzed_at: None,
        });
        assert_eq!(record.analysis_state(), AnalysisState::Ready);

        record.analysis = None;
        record.status = CallStatus::InProgress;
        assert_eq!(record.analysis_state(), AnalysisState::NotExpected);
    }

    #[test]
    fn test_analysis_deserializes_with_missing_lists() {
        let json = r#"{"risk_level": "high", "sentiment_score": -0.6}"#;
        let analysis: CallAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert!(analysis.key_topics.is_empty());
    }
}
