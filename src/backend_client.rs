use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Lead, RawServiceMatch, ValidationOutcome};
use reqwest::{StatusCode, Url};
use std::time::Duration;

/// Result of a single lead lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadFetch {
    Found(Box<Lead>),
    /// The backend does not know the id (404, or 400 for a malformed id).
    NotFound,
    /// Transport failure, unexpected status or unreadable body.
    Unavailable(String),
}

/// Client for the intelligence backend's JSON API.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    validation_timeout: Duration,
}

impl BackendClient {
    /// Creates a new `BackendClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the base URL and the per-request timeouts.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.backend_timeout())
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create backend client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.backend_base_url.clone(),
            validation_timeout: config.validation_timeout(),
        })
    }

    /// Builds `{base_url}/{segments..}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::InternalError(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::InternalError("Backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetches a lead record, once.
    ///
    /// Never returns an error: every failure is folded into [`LeadFetch`] so the caller
    /// decides how to present it.
    pub async fn fetch_lead(&self, lead_id: &str) -> LeadFetch {
        let url = match self.endpoint(&["leads", lead_id]) {
            Ok(url) => url,
            Err(e) => return LeadFetch::Unavailable(e.message()),
        };
        tracing::info!("Fetching lead {} from backend", lead_id);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Lead {} request failed: {}", lead_id, e);
                return LeadFetch::Unavailable(format!("Lead request failed: {}", e));
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            tracing::info!("Lead {} not found (backend returned {})", lead_id, status);
            return LeadFetch::NotFound;
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("Lead {} fetch returned {}: {}", lead_id, status, error_text);
            return LeadFetch::Unavailable(format!("Backend returned {}", status));
        }

        match response.json::<Lead>().await {
            Ok(lead) => {
                tracing::debug!(
                    "Lead {} loaded ({} stored service matches)",
                    lead_id,
                    lead.matched_services.len()
                );
                LeadFetch::Found(Box::new(lead))
            }
            Err(e) => {
                tracing::warn!("Failed to parse lead {}: {}", lead_id, e);
                LeadFetch::Unavailable(format!("Failed to parse lead: {}", e))
            }
        }
    }

    /// Asks the backend to compute service alignment for a lead.
    pub async fn compute_alignment(
        &self,
        lead_id: &str,
    ) -> Result<Vec<RawServiceMatch>, AppError> {
        let url = self.endpoint(&["intelligence", "service-alignment", lead_id])?;
        tracing::info!("Requesting service alignment for lead {}", lead_id);

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Service alignment request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            return Err(AppError::ExternalApiError(format!(
                "Service alignment returned {}: {}",
                status, detail
            )));
        }

        let matches: Vec<RawServiceMatch> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse service alignment: {}", e))
        })?;

        tracing::info!(
            "✓ Service alignment for lead {}: {} match(es)",
            lead_id,
            matches.len()
        );
        Ok(matches)
    }

    /// Runs one profile validation round for a lead.
    pub async fn validate_profile(&self, lead_id: &str) -> Result<ValidationOutcome, AppError> {
        let url = self.endpoint(&["intelligence", "validate-profile", lead_id])?;
        tracing::info!("Triggering profile validation for lead {}", lead_id);

        let response = self
            .client
            .get(url)
            .timeout(self.validation_timeout)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Profile validation request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            tracing::warn!(
                "Profile validation for lead {} returned {}: {}",
                lead_id,
                status,
                detail
            );
            return Err(AppError::ExternalApiError(detail));
        }

        let outcome: ValidationOutcome = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse validation response: {}", e))
        })?;

        tracing::debug!(
            "Profile validation for lead {} answered {:?}",
            lead_id,
            outcome.status
        );
        Ok(outcome)
    }
}

/// Extracts a readable message from an error response (`{"detail": ..}` or raw text).
async fn error_detail(response: reqwest::Response) -> String {
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| {
            body.get("detail")
                .or_else(|| body.get("reason"))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or(text)
}
