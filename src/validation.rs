use crate::backend_client::BackendClient;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{ValidationOutcome, ValidationStatus};
use std::time::Duration;

/// What to do about profile validation when a lead view opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Fire the validation request now.
    Trigger,
    /// The lead's stored validation fields are authoritative.
    AlreadyComplete,
    /// Terminal failure or skip; only a manual retry re-runs it.
    AwaitManualRetry,
    /// Status the backend sent is not one we know; leave it alone.
    Ignore,
}

/// Decides from the lead's stored status whether validation should run.
///
/// `processing` triggers too: the view still has to observe a result.
pub fn decide(status: Option<ValidationStatus>) -> TriggerDecision {
    match status {
        None | Some(ValidationStatus::Pending) | Some(ValidationStatus::Processing) => {
            TriggerDecision::Trigger
        }
        Some(ValidationStatus::Completed) => TriggerDecision::AlreadyComplete,
        Some(ValidationStatus::Failed) | Some(ValidationStatus::Skipped) => {
            TriggerDecision::AwaitManualRetry
        }
        Some(ValidationStatus::Unknown) => TriggerDecision::Ignore,
    }
}

/// Only a failed validation offers a manual retry.
pub fn can_retry(status: Option<ValidationStatus>) -> bool {
    status == Some(ValidationStatus::Failed)
}

/// Issues validation requests against the backend.
///
/// With the default of one round this is a single-shot request. More rounds only
/// apply while the backend answers `processing`/`pending`.
#[derive(Clone)]
pub struct ValidationPoller {
    client: BackendClient,
    max_polls: u32,
    poll_interval: Duration,
}

impl ValidationPoller {
    pub fn new(client: BackendClient, config: &Config) -> Self {
        Self {
            client,
            max_polls: config.validation_max_polls.max(1),
            poll_interval: config.validation_poll_interval(),
        }
    }

    /// Requests validation for `lead_id` until the answer settles or rounds run out.
    ///
    /// # Returns
    ///
    /// * `Result<ValidationOutcome, AppError>` - The last answer; an error only for
    ///   transport or HTTP failures.
    pub async fn poll(&self, lead_id: &str) -> Result<ValidationOutcome, AppError> {
        let mut round = 1;
        loop {
            let outcome = self.client.validate_profile(lead_id).await?;
            let still_running = matches!(
                outcome.status,
                Some(ValidationStatus::Processing) | Some(ValidationStatus::Pending)
            );

            if !still_running || round >= self.max_polls {
                if still_running {
                    tracing::info!(
                        "Validation for lead {} still processing after {} round(s)",
                        lead_id,
                        round
                    );
                }
                return Ok(outcome);
            }

            tracing::debug!(
                "Validation for lead {} processing; polling again in {:?} (round {}/{})",
                lead_id,
                self.poll_interval,
                round + 1,
                self.max_polls
            );
            tokio::time::sleep(self.poll_interval).await;
            round += 1;
        }
    }
}
