//! Service alignment resolution and display shaping.
//!
//! A lead-detail view resolves its alignment exactly once per activation, using the
//! first source that has data:
//!
//! 1. matches already stored on the lead (no network call),
//! 2. matches handed over by whoever opened the view,
//! 3. an on-demand computation by the backend.
//!
//! The resolved list keeps backend order. Sorting and filtering for display go through
//! [`display_services`], which borrows the resolved set and never mutates it.

use crate::backend_client::BackendClient;
use crate::errors::{AppError, ResultExt};
use crate::models::{AlignmentResult, AlignmentSource, Confidence, RawServiceMatch, Service};
use serde::Deserialize;
use std::cmp::Ordering;

/// Category attached to every backend recommendation.
pub const RECOMMENDED_CATEGORY: &str = "AI Recommended";

/// Normalizes one raw match record into a [`Service`].
///
/// The match score comes from `cosine_similarity`, then `score`, then 0.
/// A zero or non-finite value counts as missing.
pub fn normalize_match(index: usize, raw: &RawServiceMatch) -> Service {
    let usable = |v: &f64| v.is_finite() && *v != 0.0;
    let match_score = raw
        .cosine_similarity
        .filter(usable)
        .or(raw.score.filter(usable))
        .unwrap_or(0.0);
    let name = raw.service.clone().unwrap_or_default();

    Service {
        id: index.to_string(),
        display_name: raw.display_name.clone().unwrap_or_else(|| name.clone()),
        name,
        category: RECOMMENDED_CATEGORY.to_string(),
        match_score,
        confidence: Confidence::from_score(match_score),
        reasoning: raw.reasoning.clone().unwrap_or_default(),
        key_features: raw.key_features.clone(),
        relevant_experience: raw.relevant_experience.clone(),
        service_figures: raw.service_figures.clone().unwrap_or_default(),
    }
}

pub fn normalize_matches(raw: &[RawServiceMatch], source: AlignmentSource) -> AlignmentResult {
    AlignmentResult {
        services: raw
            .iter()
            .enumerate()
            .map(|(index, m)| normalize_match(index, m))
            .collect(),
        source,
    }
}

/// Picks the alignment source for a lead and resolves it.
#[derive(Clone)]
pub struct AlignmentResolver {
    client: BackendClient,
}

impl AlignmentResolver {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Resolves without touching the network if a stored or handed-over alignment exists.
    ///
    /// Returns `None` when the backend has to be asked.
    pub fn resolve_local(
        stored: &[RawServiceMatch],
        navigation: Option<&[RawServiceMatch]>,
    ) -> Option<AlignmentResult> {
        if !stored.is_empty() {
            return Some(normalize_matches(stored, AlignmentSource::Stored));
        }
        match navigation {
            Some(initial) if !initial.is_empty() => {
                Some(normalize_matches(initial, AlignmentSource::Navigation))
            }
            _ => None,
        }
    }

    /// Resolves the alignment for `lead_id`.
    ///
    /// # Arguments
    ///
    /// * `lead_id` - Lead being viewed.
    /// * `stored` - `matched_services` carried by the fetched lead.
    /// * `navigation` - Alignment handed over when the view was opened, if any.
    pub async fn resolve(
        &self,
        lead_id: &str,
        stored: &[RawServiceMatch],
        navigation: Option<&[RawServiceMatch]>,
    ) -> Result<AlignmentResult, AppError> {
        if let Some(result) = Self::resolve_local(stored, navigation) {
            tracing::info!(
                "Using {:?} alignment for lead {} ({} services)",
                result.source,
                lead_id,
                result.services.len()
            );
            return Ok(result);
        }

        let raw = self
            .client
            .compute_alignment(lead_id)
            .await
            .context("Failed to fetch service alignment")?;

        Ok(normalize_matches(&raw, AlignmentSource::Computed))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Match,
    Confidence,
}

/// Display-only view over a resolved alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisplayOptions {
    #[serde(default)]
    pub sort: SortKey,
    /// Keep only services of this category; `"all"` or absent keeps everything.
    pub category: Option<String>,
    /// Drop `low` confidence services.
    #[serde(default)]
    pub hide_low: bool,
}

/// Returns the services to show, sorted descending by the chosen key.
///
/// The sort is stable, so ties keep backend order and repeated calls agree.
pub fn display_services<'a>(services: &'a [Service], options: &DisplayOptions) -> Vec<&'a Service> {
    let category = options
        .category
        .as_deref()
        .filter(|c| !c.eq_ignore_ascii_case("all"));

    let mut shown: Vec<&Service> = services
        .iter()
        .filter(|s| category.map_or(true, |c| s.category == c))
        .filter(|s| !options.hide_low || s.confidence != Confidence::Low)
        .collect();

    match options.sort {
        SortKey::Match => shown.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(Ordering::Equal)
        }),
        SortKey::Confidence => shown.sort_by(|a, b| b.confidence.cmp(&a.confidence)),
    }
    shown
}

/// Distinct categories in first-seen order.
pub fn categories(services: &[Service]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for service in services {
        if !seen.contains(&service.category.as_str()) {
            seen.push(&service.category);
        }
    }
    seen
}
