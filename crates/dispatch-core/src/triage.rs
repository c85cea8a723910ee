//! Triage classifier: free text to category, severity, and triage type.
//!
//! The classifier is best effort. [`TriageClassifier::analyze`] is always
//! bounded by the configured timeout, and callers that create incidents
//! use [`TriageClassifier::analyze_or_unset`], which turns any failure
//! into `None` so the incident is created with its AI fields unset.

use std::time::Duration;

use dispatch_types::{IncidentCategory, Severity, TriageAnalysis, TriageType};
use serde::Serialize;
use tracing::warn;

use crate::config::{TriageBackend, TriageConfig};

/// Errors returned by a classifier backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    /// The request could not be sent or the response could not be read.
    #[error("classifier request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("classifier returned {0}")]
    Status(u16),

    /// The call exceeded its deadline.
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
}

/// A triage classifier backend.
#[derive(Debug)]
pub enum TriageClassifier {
    /// Deterministic keyword tables.
    Keyword(KeywordClassifier),
    /// External HTTP service.
    Http(HttpClassifier),
}

impl TriageClassifier {
    /// Build the configured backend.
    pub fn from_config(config: &TriageConfig) -> Self {
        match config.backend {
            TriageBackend::Keyword => Self::Keyword(KeywordClassifier::new(config.timeout())),
            TriageBackend::Http => Self::Http(HttpClassifier::new(&config.url, config.timeout())),
        }
    }

    /// Keyword classifier with the default timeout.
    pub fn keyword() -> Self {
        Self::Keyword(KeywordClassifier::new(TriageConfig::default().timeout()))
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Keyword(_) => "keyword",
            Self::Http(_) => "http",
        }
    }

    const fn timeout(&self) -> Duration {
        match self {
            Self::Keyword(classifier) => classifier.timeout,
            Self::Http(classifier) => classifier.timeout,
        }
    }

    /// Classify `text` within the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassifierError`] if the backend fails or times out.
    pub async fn analyze(&self, text: &str) -> Result<TriageAnalysis, ClassifierError> {
        let timeout = self.timeout();
        let call = async {
            match self {
                Self::Keyword(classifier) => Ok(classifier.classify(text)),
                Self::Http(classifier) => classifier.classify(text).await,
            }
        };
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(ClassifierError::Timeout(timeout)))
    }

    /// Classify `text`, logging and discarding any failure.
    pub async fn analyze_or_unset(&self, text: &str) -> Option<TriageAnalysis> {
        match self.analyze(text).await {
            Ok(analysis) => Some(analysis),
            Err(err) => {
                warn!(backend = self.name(), error = %err, "triage classification unavailable");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

const STEMI_KEYWORDS: &[&str] = &[
    "chest pain",
    "heart attack",
    "cardiac",
    "chest tightness",
    "crushing",
    "palpitation",
];

const STROKE_KEYWORDS: &[&str] = &[
    "stroke",
    "slurred",
    "face droop",
    "facial droop",
    "numbness",
    "one side",
    "cannot speak",
    "can't speak",
];

const BURNS_KEYWORDS: &[&str] = &["burn", "scald", "fire", "smoke", "flames"];

const TRAUMA_KEYWORDS: &[&str] = &[
    "accident",
    "crash",
    "collision",
    "fell",
    "fall",
    "bleeding",
    "fracture",
    "stab",
    "wound",
    "motorcycle",
    "hit by",
];

const PEDIATRIC_KEYWORDS: &[&str] = &["child", "baby", "infant", "toddler", "kid", "boy", "girl"];

const HIGH_SEVERITY_KEYWORDS: &[&str] = &[
    "unconscious",
    "unresponsive",
    "not breathing",
    "severe",
    "heavy bleeding",
    "cardiac arrest",
    "collapsed",
    "seizure",
];

const FIRE_KEYWORDS: &[&str] = &["fire", "smoke", "flames", "explosion"];

const ACCIDENT_KEYWORDS: &[&str] = &["accident", "crash", "collision", "hit by", "motorcycle"];

/// Classifier driven by fixed keyword tables. Deterministic and offline.
#[derive(Debug, Clone, Copy)]
pub struct KeywordClassifier {
    timeout: Duration,
}

impl KeywordClassifier {
    /// Create a keyword classifier.
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Classify `text`.
    pub fn classify(&self, text: &str) -> TriageAnalysis {
        let lowered = text.to_lowercase();
        let matches = |table: &[&str]| -> Vec<String> {
            table
                .iter()
                .filter(|keyword| lowered.contains(**keyword))
                .map(|keyword| (*keyword).to_owned())
                .collect()
        };

        // Earlier entries win ties.
        let tables = [
            (TriageType::Stemi, STEMI_KEYWORDS),
            (TriageType::Stroke, STROKE_KEYWORDS),
            (TriageType::Burns, BURNS_KEYWORDS),
            (TriageType::Trauma, TRAUMA_KEYWORDS),
            (TriageType::Pediatric, PEDIATRIC_KEYWORDS),
        ];

        let mut keywords = Vec::new();
        let mut best: Option<(TriageType, usize)> = None;
        for (triage, table) in tables {
            let hits = matches(table);
            if !hits.is_empty() && best.is_none_or(|(_, count)| hits.len() > count) {
                best = Some((triage, hits.len()));
            }
            for hit in hits {
                if !keywords.contains(&hit) {
                    keywords.push(hit);
                }
            }
        }

        let severity_hits = matches(HIGH_SEVERITY_KEYWORDS);
        let triage_type = best.map(|(triage, _)| triage);

        let category = if !matches(FIRE_KEYWORDS).is_empty() {
            IncidentCategory::Fire
        } else if !matches(ACCIDENT_KEYWORDS).is_empty() {
            IncidentCategory::Accident
        } else if triage_type.is_some() || !severity_hits.is_empty() {
            IncidentCategory::Medical
        } else {
            IncidentCategory::Other
        };

        let severity = if !severity_hits.is_empty()
            || matches!(triage_type, Some(TriageType::Stemi | TriageType::Stroke))
        {
            Severity::High
        } else {
            Severity::Low
        };

        for hit in severity_hits {
            if !keywords.contains(&hit) {
                keywords.push(hit);
            }
        }

        let confidence = if keywords.is_empty() {
            0.3
        } else {
            let count = u32::try_from(keywords.len()).unwrap_or(u32::MAX);
            f64::from(count).mul_add(0.1, 0.5).min(0.95)
        };

        TriageAnalysis {
            category,
            severity,
            triage_type,
            confidence,
            keywords,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Client for an external classifier answering `POST {url}` with a
/// [`TriageAnalysis`] body.
#[derive(Debug)]
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct AnalyzeBody<'a> {
    text: &'a str,
}

impl HttpClassifier {
    /// Create a client for the classifier at `url`.
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_owned(),
            timeout,
        }
    }

    async fn classify(&self, text: &str) -> Result<TriageAnalysis, ClassifierError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AnalyzeBody { text })
            .send()
            .await
            .map_err(|e| ClassifierError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ClassifierError::Http(format!("response parse failed: {e}")))
    }
}
