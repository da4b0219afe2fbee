use serde::{Deserialize, Deserializer, Serialize};

/// Minimum match score for the `high` confidence tier.
pub const HIGH_CONFIDENCE_SCORE: f64 = 80.0;
/// Minimum match score for the `medium` confidence tier.
pub const MEDIUM_CONFIDENCE_SCORE: f64 = 60.0;
/// Minimum aggregate score for a `Proceed` qualification decision.
pub const PROCEED_SCORE: f64 = 70.0;

/// Treats an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============ Backend Models ============

/// Lead record as returned by `GET /leads/{id}`.
///
/// The backend owns this record; every field is optional at the boundary and the
/// view only ever holds a read/merge copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Option<String>,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub website: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub pain_points: Option<String>,
    /// Service alignment score.
    pub score: Option<f64>,
    pub owner: Option<String>,
    pub created_at: Option<String>,
    pub profile_score: Option<f64>,
    pub final_score: Option<f64>,
    pub qualification_decision: Option<QualificationDecision>,
    // The backend has shipped both spellings, sometimes in the same record.
    #[serde(rename = "validation_status")]
    pub validation_status: Option<ValidationStatus>,
    #[serde(rename = "validationStatus")]
    pub validation_status_camel: Option<ValidationStatus>,
    #[serde(rename = "last_error")]
    pub last_error: Option<String>,
    #[serde(rename = "lastError")]
    pub last_error_camel: Option<String>,
    #[serde(rename = "profile_validation")]
    pub profile_validation: Option<ProfileValidation>,
    #[serde(rename = "profileValidation")]
    pub profile_validation_camel: Option<ProfileValidation>,
    /// Alignment computed earlier and stored on the lead.
    #[serde(
        rename = "matched_services",
        default,
        deserialize_with = "null_as_default"
    )]
    pub matched_services: Vec<RawServiceMatch>,
}

impl Lead {
    /// Stored validation status, snake_case spelling first.
    pub fn stored_validation_status(&self) -> Option<ValidationStatus> {
        self.validation_status.or(self.validation_status_camel)
    }

    /// Stored failure reason; blank values count as absent.
    pub fn stored_last_error(&self) -> Option<String> {
        [&self.last_error, &self.last_error_camel]
            .into_iter()
            .flatten()
            .find(|e| !e.trim().is_empty())
            .cloned()
    }

    pub fn stored_profile_validation(&self) -> Option<ProfileValidation> {
        self.profile_validation
            .clone()
            .or_else(|| self.profile_validation_camel.clone())
    }
}

/// One relevant-experience entry attached to a service match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExperienceEntry {
    Text(String),
    Detailed {
        #[serde(default)]
        client: Option<String>,
        #[serde(default)]
        outcome: Option<String>,
    },
}

/// A service match as produced by the alignment endpoint (or stored on the lead).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawServiceMatch {
    pub service: Option<String>,
    pub display_name: Option<String>,
    pub cosine_similarity: Option<f64>,
    pub score: Option<f64>,
    pub reasoning: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_features: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relevant_experience: Vec<ExperienceEntry>,
    pub service_figures: Option<String>,
}

/// Scoring detail of a profile validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileValidation {
    pub company_match_score: Option<f64>,
    pub designation_score: Option<f64>,
    pub content_relevance_score: Option<f64>,
    pub total_profile_score: Option<f64>,
    pub reasoning: Option<String>,
    pub designation: Option<String>,
    pub is_decision_maker: Option<bool>,
}

/// Response of `GET /intelligence/validate-profile/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: Option<ValidationStatus>,
    pub profile_score: Option<f64>,
    pub final_score: Option<f64>,
    pub qualification_decision: Option<QualificationDecision>,
    pub profile_validation: Option<ProfileValidation>,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ValidationOutcome {
    /// Human-readable failure reason, falling back to `"Unknown error"`.
    pub fn failure_reason(&self) -> String {
        [&self.reason, &self.message]
            .into_iter()
            .flatten()
            .find(|r| !r.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

// ============ Shared Enums ============

/// Per-lead profile validation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pending,
    Processing,
    Completed,
    #[serde(alias = "error")]
    Failed,
    Skipped,
    #[serde(other)]
    Unknown,
}

/// Whether sales should pursue the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualificationDecision {
    Proceed,
    Hold,
}

impl QualificationDecision {
    pub fn from_score(final_score: f64) -> Self {
        if final_score >= PROCEED_SCORE {
            QualificationDecision::Proceed
        } else {
            QualificationDecision::Hold
        }
    }
}

/// Three-level bucket over a 0-100 match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_SCORE {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

// ============ View Models ============

/// A service match normalized for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Position in the list the backend returned.
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub category: String,
    pub match_score: f64,
    pub confidence: Confidence,
    pub reasoning: String,
    pub key_features: Vec<String>,
    pub relevant_experience: Vec<ExperienceEntry>,
    pub service_figures: String,
}

/// Where a resolved alignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentSource {
    /// Stored on the lead record.
    Stored,
    /// Handed over by the caller that opened the view.
    Navigation,
    /// Computed on demand by the backend.
    Computed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentResult {
    pub services: Vec<Service>,
    pub source: AlignmentSource,
}
