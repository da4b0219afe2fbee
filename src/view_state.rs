//! Renderable lead-detail state.
//!
//! A [`LeadView`] combines the fetched lead, the resolved alignment and the profile
//! validation. Each merge writes only its own namespace, so results may land in any
//! order and any subset of them may be present.
//!
//! Validation scores are shown if and only if the validation status is `completed`.

use crate::models::{
    AlignmentResult, Lead, ProfileValidation, QualificationDecision, ValidationOutcome,
    ValidationStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Business attributes of the lead shown in the header card.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadProfile {
    pub id: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub website: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub pain_points: Option<String>,
    pub score: f64,
    pub owner: Option<String>,
    pub created_at: Option<String>,
}

impl LeadProfile {
    fn from_lead(lead_id: &str, lead: &Lead) -> Self {
        Self {
            id: lead.id.clone().unwrap_or_else(|| lead_id.to_string()),
            company_name: lead.company_name.clone(),
            industry: lead.industry.clone(),
            company_size: lead.company_size.clone(),
            website: lead.website.clone(),
            budget: lead.budget.clone(),
            timeline: lead.timeline.clone(),
            pain_points: lead.pain_points.clone(),
            score: lead.score.unwrap_or(0.0),
            owner: lead.owner.clone(),
            created_at: lead.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum LeadSlot {
    Loading,
    Loaded(LeadProfile),
    NotFound,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum AlignmentState {
    /// Waiting for the lead before a source can be chosen.
    Pending,
    Loading,
    Resolved(AlignmentResult),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationScores {
    pub profile_score: f64,
    pub final_score: f64,
    pub qualification_decision: QualificationDecision,
    pub profile_validation: Option<ProfileValidation>,
}

impl ValidationScores {
    /// Builds scores, deriving the decision from the final score when it is missing.
    fn new(
        profile_score: Option<f64>,
        final_score: Option<f64>,
        decision: Option<QualificationDecision>,
        detail: Option<ProfileValidation>,
    ) -> Self {
        let final_score = final_score.unwrap_or(0.0);
        Self {
            profile_score: profile_score.unwrap_or(0.0),
            final_score,
            qualification_decision: decision
                .unwrap_or_else(|| QualificationDecision::from_score(final_score)),
            profile_validation: detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationView {
    pub status: ValidationStatus,
    /// A validation request is outstanding.
    pub in_flight: bool,
    pub scores: Option<ValidationScores>,
    pub last_error: Option<String>,
}

impl Default for ValidationView {
    fn default() -> Self {
        Self {
            status: ValidationStatus::Pending,
            in_flight: false,
            scores: None,
            last_error: None,
        }
    }
}

/// Overall state of the view, used to pick what to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPhase {
    Loading,
    NotFound,
    Error,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    pub lead_id: String,
    pub lead: LeadSlot,
    pub alignment: AlignmentState,
    pub validation: ValidationView,
    pub updated_at: DateTime<Utc>,
}

impl LeadView {
    pub fn loading(lead_id: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            lead: LeadSlot::Loading,
            alignment: AlignmentState::Pending,
            validation: ValidationView::default(),
            updated_at: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Lead fetch failures escalate; alignment failure is an error; validation never is.
    pub fn phase(&self) -> ViewPhase {
        match (&self.lead, &self.alignment) {
            (LeadSlot::Loading, _) => ViewPhase::Loading,
            (LeadSlot::NotFound, _) | (LeadSlot::Unavailable(_), _) => ViewPhase::NotFound,
            (LeadSlot::Loaded(_), AlignmentState::Failed(_)) => ViewPhase::Error,
            (LeadSlot::Loaded(_), AlignmentState::Pending | AlignmentState::Loading) => {
                ViewPhase::Loading
            }
            (LeadSlot::Loaded(_), AlignmentState::Resolved(_)) => ViewPhase::Ready,
        }
    }

    // ---- lead namespace ----

    /// Installs the fetched lead and seeds validation from its stored fields.
    pub fn apply_lead(&mut self, lead: &Lead) {
        self.lead = LeadSlot::Loaded(LeadProfile::from_lead(&self.lead_id, lead));

        let status = lead.stored_validation_status().unwrap_or(ValidationStatus::Pending);
        self.validation.status = status;
        self.validation.scores = None;
        self.validation.last_error = None;
        match status {
            ValidationStatus::Completed => {
                self.validation.scores = Some(ValidationScores::new(
                    lead.profile_score,
                    lead.final_score,
                    lead.qualification_decision,
                    lead.stored_profile_validation(),
                ));
            }
            ValidationStatus::Failed => {
                self.validation.last_error = lead.stored_last_error();
            }
            _ => {}
        }
        self.touch();
    }

    pub fn mark_lead_not_found(&mut self) {
        self.lead = LeadSlot::NotFound;
        self.touch();
    }

    pub fn mark_lead_unavailable(&mut self, reason: impl Into<String>) {
        self.lead = LeadSlot::Unavailable(reason.into());
        self.touch();
    }

    // ---- alignment namespace ----

    pub fn begin_alignment(&mut self) {
        self.alignment = AlignmentState::Loading;
        self.touch();
    }

    pub fn apply_alignment(&mut self, result: AlignmentResult) {
        self.alignment = AlignmentState::Resolved(result);
        self.touch();
    }

    pub fn fail_alignment(&mut self, message: impl Into<String>) {
        self.alignment = AlignmentState::Failed(message.into());
        self.touch();
    }

    pub fn alignment(&self) -> Option<&AlignmentResult> {
        match &self.alignment {
            AlignmentState::Resolved(result) => Some(result),
            _ => None,
        }
    }

    // ---- validation namespace ----

    /// A request was fired: `processing` with the loading indicator on.
    pub fn begin_validation(&mut self) {
        self.validation.status = ValidationStatus::Processing;
        self.validation.in_flight = true;
        self.validation.scores = None;
        self.touch();
    }

    /// Merges a validation answer. Touches nothing outside `self.validation`.
    pub fn apply_validation(&mut self, outcome: &ValidationOutcome) {
        let validation = &mut self.validation;
        validation.in_flight = false;

        match outcome.status {
            Some(ValidationStatus::Completed) => {
                validation.status = ValidationStatus::Completed;
                validation.scores = Some(ValidationScores::new(
                    outcome.profile_score,
                    outcome.final_score,
                    outcome.qualification_decision,
                    outcome.profile_validation.clone(),
                ));
                validation.last_error = None;
            }
            Some(ValidationStatus::Failed) => {
                validation.status = ValidationStatus::Failed;
                validation.scores = None;
                validation.last_error = Some(outcome.failure_reason());
            }
            Some(ValidationStatus::Skipped) => {
                validation.status = ValidationStatus::Skipped;
                validation.scores = None;
                validation.last_error = None;
            }
            Some(ValidationStatus::Processing) | Some(ValidationStatus::Pending) => {
                validation.status = ValidationStatus::Processing;
                validation.scores = None;
            }
            Some(ValidationStatus::Unknown) | None => {
                validation.status = ValidationStatus::Failed;
                validation.scores = None;
                validation.last_error = Some("Unexpected validation response".to_string());
            }
        }
        self.touch();
    }

    /// The request itself failed (transport or HTTP error).
    pub fn fail_validation(&mut self, reason: impl Into<String>) {
        self.validation.status = ValidationStatus::Failed;
        self.validation.in_flight = false;
        self.validation.scores = None;
        self.validation.last_error = Some(reason.into());
        self.touch();
    }
}
