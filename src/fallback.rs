// src/fallback.rs
//! Ordered provider fallback for one logical query.
//!
//! Candidates are tried strictly in the order they were added, one at a time.
//! A candidate failing with a fallback-triggering error hands over to the next
//! one; any other error ends the chain immediately. A candidate whose provider
//! has no credential is recorded as skipped and never run. When every candidate has
//! failed the chain either settles on a registered static default (flagged as
//! unreliable) or reports exhaustion with every source it tried.

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;

use crate::envelope::{Confidence, EnvelopeMetadata, ResultEnvelope};
use crate::error::{ErrorKind, ToolError};
use crate::models::to_payload;

/// Source name recorded when the chain settles on its static default.
pub const STATIC_DEFAULT_SOURCE: &str = "static_default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    TryingCandidate(usize),
    Succeeded(usize),
    Exhausted,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::TryingCandidate(i) => write!(f, "trying candidate #{}", i + 1),
            Self::Succeeded(i) => write!(f, "succeeded on candidate #{}", i + 1),
            Self::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Terminal outcome of one provider attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Empty { reason: String },
    Failed { kind: ErrorKind, reason: String },
    TimedOut { reason: String },
    Skipped { reason: String },
}

impl AttemptOutcome {
    fn from_error(error: &ToolError) -> Self {
        let reason = error.to_string();
        match error.kind() {
            ErrorKind::NotFound | ErrorKind::IncompletePayload => Self::Empty { reason },
            ErrorKind::ProviderTimeout => Self::TimedOut { reason },
            kind => Self::Failed { kind, reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAttempt {
    pub source: String,
    pub confidence: Confidence,
    pub outcome: AttemptOutcome,
}

/// Payload a chain settled on, with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub data: Value,
    pub source: String,
    pub confidence: Confidence,
    /// False only when the static default was used.
    pub reliable: bool,
    pub note: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
}

impl Resolved {
    /// Sources tried, in order, including the winner.
    pub fn attempted_sources(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.source.clone()).collect()
    }

    pub fn into_envelope(self, tool: &str, data_type: &str) -> ResultEnvelope {
        let attempted = self.attempted_sources();
        let metadata = EnvelopeMetadata::new(self.source, data_type)
            .with_confidence(self.confidence)
            .with_attempted_sources(attempted);
        if self.reliable {
            let metadata = match self.note {
                Some(note) => metadata.with_note(note),
                None => metadata,
            };
            ResultEnvelope::reliable(tool, self.data, metadata)
        } else {
            let note = self.note.unwrap_or_default();
            ResultEnvelope::best_effort(tool, self.data, metadata, note)
        }
    }
}

type CandidateRun<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<Value, ToolError>> + Send + 'a>;

struct Candidate<'a> {
    source: String,
    confidence: Confidence,
    run: CandidateRun<'a>,
}

enum Step<'a> {
    Run(Candidate<'a>),
    Unconfigured {
        source: String,
        confidence: Confidence,
        error: ToolError,
    },
}

struct StaticDefault {
    source: String,
    data: Value,
    note: String,
}

pub struct FallbackChain<'a> {
    label: String,
    steps: Vec<Step<'a>>,
    default: Option<StaticDefault>,
}

impl<'a> FallbackChain<'a> {
    /// `label` identifies the query in logs, e.g. `"quote AAPL"`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
            default: None,
        }
    }

    /// Appends a candidate. `fetch` is only invoked if every earlier
    /// candidate failed with a fallback-triggering error.
    pub fn candidate<F, Fut, T>(mut self, source: impl Into<String>, confidence: Confidence, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, ToolError>> + Send + 'a,
        T: Serialize + Send + 'a,
    {
        let run: CandidateRun<'a> = Box::new(move || {
            async move {
                let value = fetch().await?;
                to_payload(&value)
            }
            .boxed()
        });
        self.steps.push(Step::Run(Candidate {
            source: source.into(),
            confidence,
            run,
        }));
        self
    }

    /// Appends a candidate that needs a provider credential. When
    /// `credential` is an error the candidate is recorded as skipped instead.
    pub fn keyed_candidate<K, F, Fut, T>(
        mut self,
        source: impl Into<String>,
        confidence: Confidence,
        credential: Result<K, ToolError>,
        fetch: F,
    ) -> Self
    where
        K: Send + 'a,
        F: FnOnce(K) -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, ToolError>> + Send + 'a,
        T: Serialize + Send + 'a,
    {
        match credential {
            Ok(key) => self.candidate(source, confidence, move || fetch(key)),
            Err(error) => {
                self.steps.push(Step::Unconfigured {
                    source: source.into(),
                    confidence,
                    error,
                });
                self
            }
        }
    }

    /// Low-confidence answer used when every candidate fails. The result is
    /// flagged unreliable and carries `note`.
    pub fn with_default<T: Serialize>(
        mut self,
        source: impl Into<String>,
        data: &T,
        note: impl Into<String>,
    ) -> Result<Self, ToolError> {
        self.default = Some(StaticDefault {
            source: source.into(),
            data: to_payload(data)?,
            note: note.into(),
        });
        Ok(self)
    }

    /// Number of candidates that will actually run.
    pub fn len(&self) -> usize {
        self.steps.iter().filter(|step| matches!(step, Step::Run(_))).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn resolve(self) -> Result<Resolved, ToolError> {
        let runnable = self.len();
        if self.is_empty() && self.default.is_none() && !self.steps.is_empty() {
            let error = self
                .steps
                .into_iter()
                .find_map(|step| match step {
                    Step::Unconfigured { error, .. } => Some(error),
                    Step::Run(_) => None,
                })
                .unwrap_or_else(|| ToolError::Internal("no runnable candidate".to_string()));
            warn!("❌ [{}] no configured provider: {}", self.label, error);
            return Err(error);
        }

        let Self { label, steps, default } = self;
        let mut state = ChainState::Pending;
        debug!("🔗 [{}] {} ({} of {} candidates configured)", label, state, runnable, steps.len());

        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(steps.len() + 1);
        let mut skipped: Vec<String> = Vec::new();
        let mut last_error: Option<ToolError> = None;

        for (index, step) in steps.into_iter().enumerate() {
            let candidate = match step {
                Step::Run(candidate) => candidate,
                Step::Unconfigured {
                    source,
                    confidence,
                    error,
                } => {
                    debug!("⏭️ [{}] {} skipped: {}", label, source, error);
                    skipped.push(error.to_string());
                    attempts.push(ProviderAttempt {
                        source,
                        confidence,
                        outcome: AttemptOutcome::Skipped {
                            reason: error.to_string(),
                        },
                    });
                    continue;
                }
            };
            state = ChainState::TryingCandidate(index);
            debug!("🔗 [{}] {}: {}", label, state, candidate.source);

            match (candidate.run)().await {
                Ok(data) => {
                    state = ChainState::Succeeded(index);
                    info!("✅ [{}] {} via {} ({})", label, state, candidate.source, candidate.confidence);
                    attempts.push(ProviderAttempt {
                        source: candidate.source.clone(),
                        confidence: candidate.confidence,
                        outcome: AttemptOutcome::Success,
                    });
                    let note = (!skipped.is_empty()).then(|| format!("Skipped {}", skipped.join("; ")));
                    return Ok(Resolved {
                        data,
                        source: candidate.source,
                        confidence: candidate.confidence,
                        reliable: true,
                        note,
                        attempts,
                    });
                }
                Err(err) if err.triggers_fallback() => {
                    warn!("⚠️ [{}] {} failed: {}", label, candidate.source, err);
                    attempts.push(ProviderAttempt {
                        source: candidate.source,
                        confidence: candidate.confidence,
                        outcome: AttemptOutcome::from_error(&err),
                    });
                    last_error = Some(err);
                }
                Err(err) => {
                    warn!("❌ [{}] {} failed, not chained: {}", label, candidate.source, err);
                    return Err(err);
                }
            }
        }

        state = ChainState::Exhausted;
        let attempted: Vec<String> = attempts.iter().map(|a| a.source.clone()).collect();
        let last_error = last_error
            .map(|e| e.to_string())
            .or_else(|| skipped.last().cloned())
            .unwrap_or_else(|| "no candidates registered".to_string());

        match default {
            Some(fallback) => {
                warn!(
                    "⚠️ [{}] {} after [{}], using {}",
                    label,
                    state,
                    attempted.join(", "),
                    fallback.source
                );
                let note = if attempted.is_empty() {
                    fallback.note
                } else {
                    format!(
                        "{} (tried: {}; last error: {})",
                        fallback.note,
                        attempted.join(", "),
                        last_error
                    )
                };
                attempts.push(ProviderAttempt {
                    source: fallback.source.clone(),
                    confidence: Confidence::Low,
                    outcome: AttemptOutcome::Success,
                });
                Ok(Resolved {
                    data: fallback.data,
                    source: fallback.source,
                    confidence: Confidence::Low,
                    reliable: false,
                    note: Some(note),
                    attempts,
                })
            }
            None => {
                warn!("❌ [{}] {} after [{}]", label, state, attempted.join(", "));
                Err(ToolError::Exhausted {
                    attempted,
                    last_error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn http_404(provider: &str) -> ToolError {
        ToolError::Provider(ProviderError::Http {
            provider: provider.to_string(),
            status: 404,
        })
    }

    #[tokio::test]
    async fn first_success_wins_and_later_candidates_never_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let third = calls.clone();
        let resolved = FallbackChain::new("quote TEST")
            .candidate("a", Confidence::High, || async { Err::<Value, _>(http_404("a")) })
            .candidate("b", Confidence::Medium, || async { Ok(json!({"price": 1.0})) })
            .candidate("c", Confidence::Low, move || async move {
                third.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"price": 2.0}))
            })
            .resolve()
            .await
            .unwrap();

        assert_eq!(resolved.source, "b");
        assert_eq!(resolved.confidence, Confidence::Medium);
        assert!(resolved.reliable);
        assert_eq!(resolved.attempted_sources(), vec!["a", "b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhaustion_lists_every_candidate_in_order() {
        let err = FallbackChain::new("quote TEST")
            .candidate("a", Confidence::High, || async { Err::<Value, _>(http_404("a")) })
            .candidate("b", Confidence::Medium, || async {
                Err::<Value, _>(ToolError::not_found("b", "nothing"))
            })
            .candidate("c", Confidence::Low, || async {
                Err::<Value, _>(ToolError::incomplete("c", "price"))
            })
            .resolve()
            .await
            .unwrap_err();

        match err {
            ToolError::Exhausted { attempted, last_error } => {
                assert_eq!(attempted, vec!["a", "b", "c"]);
                assert!(last_error.contains("price"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn static_default_is_low_confidence_and_unreliable() {
        let resolved = FallbackChain::new("asset_type ZZZZ")
            .candidate("a", Confidence::High, || async { Err::<Value, _>(http_404("a")) })
            .with_default(STATIC_DEFAULT_SOURCE, &json!({"analysis_framework": "stock_analysis"}), "guessed")
            .unwrap()
            .resolve()
            .await
            .unwrap();

        assert!(!resolved.reliable);
        assert_eq!(resolved.confidence, Confidence::Low);
        assert!(resolved.note.as_deref().unwrap().starts_with("guessed"));
        assert_eq!(resolved.attempted_sources(), vec!["a", STATIC_DEFAULT_SOURCE]);
    }

    #[tokio::test]
    async fn non_fallback_errors_stop_the_chain() {
        let err = FallbackChain::new("quote TEST")
            .candidate("a", Confidence::High, || async {
                Err::<Value, _>(ToolError::not_configured("a", "A_KEY"))
            })
            .candidate("b", Confidence::Medium, || async { Ok(json!({})) })
            .resolve()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn unconfigured_candidates_are_skipped_not_fatal() {
        let resolved = FallbackChain::new("quote TEST")
            .keyed_candidate("a", Confidence::High, Err::<&str, _>(ToolError::not_configured("a", "A_KEY")), |_key| async {
                Ok(json!({"price": 1.0}))
            })
            .keyed_candidate("b", Confidence::Medium, Ok("b-key"), |key| async move {
                Ok(json!({"key": key}))
            })
            .resolve()
            .await
            .unwrap();

        assert!(resolved.reliable);
        assert_eq!(resolved.source, "b");
        assert_eq!(resolved.data["key"], "b-key");
        assert_eq!(resolved.attempted_sources(), vec!["a", "b"]);
        assert!(matches!(resolved.attempts[0].outcome, AttemptOutcome::Skipped { .. }));
        assert!(resolved.note.as_deref().unwrap().contains("A_KEY"));
    }

    #[tokio::test]
    async fn chain_without_any_configured_candidate_is_a_configuration_error() {
        let chain = FallbackChain::new("quote TEST")
            .keyed_candidate("a", Confidence::High, Err::<&str, _>(ToolError::not_configured("a", "A_KEY")), |_key| async {
                Ok(json!({}))
            })
            .keyed_candidate("b", Confidence::Medium, Err::<&str, _>(ToolError::not_configured("b", "B_KEY")), |_key| async {
                Ok(json!({}))
            });
        assert!(chain.is_empty());

        let err = chain.resolve().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("A_KEY"));
    }

    #[tokio::test]
    async fn unconfigured_chain_still_reaches_its_default() {
        let resolved = FallbackChain::new("watchlist default")
            .keyed_candidate("a", Confidence::High, Err::<&str, _>(ToolError::not_configured("a", "A_KEY")), |_key| async {
                Ok(json!({}))
            })
            .with_default("static", &json!(["AAPL"]), "static list")
            .unwrap()
            .resolve()
            .await
            .unwrap();
        assert!(!resolved.reliable);
        assert_eq!(resolved.source, "static");
    }

    #[test]
    fn outcomes_classify_errors() {
        let timeout = ToolError::Provider(ProviderError::Timeout {
            provider: "a".into(),
            timeout_ms: 10,
        });
        assert!(matches!(AttemptOutcome::from_error(&timeout), AttemptOutcome::TimedOut { .. }));
        assert!(matches!(
            AttemptOutcome::from_error(&ToolError::not_found("a", "x")),
            AttemptOutcome::Empty { .. }
        ));
        assert!(matches!(AttemptOutcome::from_error(&http_404("a")), AttemptOutcome::Failed { .. }));
    }
}
