// src/envelope.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ToolError;

/// A-priori reliability of a provider for one data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub source: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_tickers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
}

impl EnvelopeMetadata {
    pub fn new(source: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_attempted_sources(mut self, sources: Vec<String>) -> Self {
        if !sources.is_empty() {
            self.attempted_sources = Some(sources);
        }
        self
    }

    pub fn with_error(mut self, error: &ToolError) -> Self {
        self.error = Some(error.to_string());
        self.error_kind = Some(error.kind().as_str().to_string());
        if let ToolError::Exhausted { attempted, .. } = error {
            if self.attempted_sources.is_none() {
                self.attempted_sources = Some(attempted.clone());
            }
        }
        self
    }
}

/// Uniform return value of every tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub data: Value,
    pub is_reliable: bool,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub metadata: EnvelopeMetadata,
}

impl ResultEnvelope {
    pub fn reliable(tool: impl Into<String>, data: Value, metadata: EnvelopeMetadata) -> Self {
        Self {
            data,
            is_reliable: true,
            timestamp: Utc::now(),
            tool: tool.into(),
            metadata,
        }
    }

    /// Unreliable envelope that still carries a payload, explained by `note`.
    pub fn best_effort(
        tool: impl Into<String>,
        data: Value,
        metadata: EnvelopeMetadata,
        note: impl Into<String>,
    ) -> Self {
        let mut metadata = metadata;
        let note = note.into();
        metadata.note = Some(if note.trim().is_empty() {
            "served from a degraded source".to_string()
        } else {
            note
        });
        Self {
            data,
            is_reliable: false,
            timestamp: Utc::now(),
            tool: tool.into(),
            metadata,
        }
    }

    /// Total failure: null payload, error message and kind recorded.
    pub fn failure(tool: impl Into<String>, metadata: EnvelopeMetadata, error: &ToolError) -> Self {
        let metadata = metadata.with_error(error);
        Self {
            data: Value::Null,
            is_reliable: false,
            timestamp: Utc::now(),
            tool: tool.into(),
            metadata,
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.metadata.execution_id = Some(execution_id.into());
        self
    }

    /// An unreliable envelope must explain itself.
    pub fn is_explained(&self) -> bool {
        let non_empty = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        self.is_reliable || non_empty(&self.metadata.error) || non_empty(&self.metadata.note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_envelope_is_explained_and_null() {
        let err = ToolError::MissingParameter("symbol".into());
        let envelope = ResultEnvelope::failure("Stock Quote", EnvelopeMetadata::new("none", "quote"), &err);
        assert!(!envelope.is_reliable);
        assert!(envelope.data.is_null());
        assert!(envelope.is_explained());
        assert_eq!(envelope.metadata.error_kind.as_deref(), Some("validation"));
    }

    #[test]
    fn best_effort_never_has_blank_note() {
        let envelope = ResultEnvelope::best_effort(
            "Asset Type",
            json!({"product_type": "Unknown"}),
            EnvelopeMetadata::new("static_default", "asset_type"),
            "",
        );
        assert!(!envelope.is_reliable);
        assert!(envelope.is_explained());
    }

    #[test]
    fn wire_shape_skips_absent_metadata() {
        let envelope = ResultEnvelope::reliable(
            "Stock Quote",
            json!({"price": 10.0}),
            EnvelopeMetadata::new("financialmodelingprep.com", "quote").with_confidence(Confidence::High),
        );
        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["metadata"]["confidence"], "high");
        assert!(wire["metadata"].get("error").is_none());
        assert!(wire["timestamp"].as_str().unwrap().contains('T'));
    }
}
