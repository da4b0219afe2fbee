/// Lead-detail view orchestration.
///
/// Opening a view runs these steps:
/// 1. Fetch the lead (awaited; a missing lead ends the flow)
/// 2. Resolve service alignment in a background task
/// 3. Trigger profile validation in a separate background task, when the stored status asks for it
///
/// Steps 2 and 3 never wait on each other. Each merges its result through the
/// activation's ticket, so a result for a lead that is no longer shown is dropped.
use crate::alignment::AlignmentResolver;
use crate::backend_client::{BackendClient, LeadFetch};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{RawServiceMatch, ValidationStatus};
use crate::session::{ViewSlot, ViewTicket};
use crate::validation::{self, TriggerDecision, ValidationPoller};
use crate::view_state::LeadView;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A view snapshot plus the background work it started.
///
/// HTTP handlers drop `tasks` (detaching them); tests await them.
pub struct ViewActivity {
    pub view: LeadView,
    pub tasks: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct LeadDetailService {
    client: BackendClient,
    resolver: AlignmentResolver,
    poller: ValidationPoller,
}

impl LeadDetailService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = BackendClient::new(config)?;
        Ok(Self {
            resolver: AlignmentResolver::new(client.clone()),
            poller: ValidationPoller::new(client.clone(), config),
            client,
        })
    }

    /// Activates the view for `lead_id` in `slot` and starts enrichment.
    ///
    /// # Arguments
    ///
    /// * `slot` - The session's view slot.
    /// * `lead_id` - Lead to show.
    /// * `navigation` - Alignment computed by the caller (e.g. at lead creation), if any.
    ///
    /// # Returns
    ///
    /// * `Result<ViewActivity, AppError>` - `Conflict` if another activation replaced this
    ///   one while the lead was loading.
    pub async fn open(
        &self,
        slot: Arc<ViewSlot>,
        lead_id: &str,
        navigation: Option<Vec<RawServiceMatch>>,
    ) -> Result<ViewActivity, AppError> {
        let ticket = slot.activate(lead_id).await;
        let mut tasks = Vec::new();

        match self.client.fetch_lead(lead_id).await {
            LeadFetch::NotFound => {
                slot.update(&ticket, |view| view.mark_lead_not_found())
                    .await;
            }
            LeadFetch::Unavailable(reason) => {
                slot.update(&ticket, |view| view.mark_lead_unavailable(reason))
                    .await;
            }
            LeadFetch::Found(lead) => {
                let decision = validation::decide(lead.stored_validation_status());
                let applied = slot
                    .update(&ticket, |view| {
                        view.apply_lead(&lead);
                        view.begin_alignment();
                        if decision == TriggerDecision::Trigger {
                            view.begin_validation();
                        }
                    })
                    .await;

                if applied.is_some() {
                    tasks.push(
                        self.spawn_alignment(&slot, &ticket, lead.matched_services, navigation)
                            .await,
                    );
                    match decision {
                        TriggerDecision::Trigger => {
                            tasks.push(self.spawn_validation(&slot, &ticket).await);
                        }
                        other => {
                            tracing::debug!(
                                "Not triggering validation for lead {}: {:?}",
                                lead_id,
                                other
                            );
                        }
                    }
                }
            }
        }

        let view = slot
            .update(&ticket, |view| view.clone())
            .await
            .ok_or_else(|| {
                AppError::Conflict(format!("View for lead {} was superseded", lead_id))
            })?;

        Ok(ViewActivity { view, tasks })
    }

    /// Re-runs validation for the open view; only allowed from `failed`.
    pub async fn retry_validation(&self, slot: Arc<ViewSlot>) -> Result<ViewActivity, AppError> {
        let (ticket, _) = slot
            .current()
            .await
            .ok_or_else(|| AppError::NotFound("No lead view is open".to_string()))?;

        let started = slot
            .update(&ticket, |view| {
                if validation::can_retry(Some(view.validation.status)) && !view.validation.in_flight
                {
                    view.begin_validation();
                    Some(view.clone())
                } else {
                    None
                }
            })
            .await
            .flatten();

        let Some(view) = started else {
            return Err(AppError::Conflict(format!(
                "Validation for lead {} is not in a failed state",
                ticket.lead_id
            )));
        };

        tracing::info!("Retrying profile validation for lead {}", ticket.lead_id);
        let task = self.spawn_validation(&slot, &ticket).await;
        Ok(ViewActivity {
            view,
            tasks: vec![task],
        })
    }

    async fn spawn_alignment(
        &self,
        slot: &Arc<ViewSlot>,
        ticket: &ViewTicket,
        stored: Vec<RawServiceMatch>,
        navigation: Option<Vec<RawServiceMatch>>,
    ) -> JoinHandle<()> {
        let resolver = self.resolver.clone();
        let task_slot = Arc::clone(slot);
        let task_ticket = ticket.clone();

        let handle = tokio::spawn(async move {
            let lead_id = task_ticket.lead_id.as_str();
            match resolver
                .resolve(lead_id, &stored, navigation.as_deref())
                .await
            {
                Ok(alignment) => {
                    let count = alignment.services.len();
                    if task_slot
                        .update(&task_ticket, |view| view.apply_alignment(alignment))
                        .await
                        .is_some()
                    {
                        tracing::info!("✓ Alignment resolved for lead {} ({} services)", lead_id, count);
                    }
                }
                Err(e) => {
                    tracing::error!("Alignment for lead {} failed: {}", lead_id, e);
                    task_slot
                        .update(&task_ticket, |view| view.fail_alignment(e.message()))
                        .await;
                }
            }
        });

        slot.track(ticket, handle.abort_handle()).await;
        handle
    }

    async fn spawn_validation(&self, slot: &Arc<ViewSlot>, ticket: &ViewTicket) -> JoinHandle<()> {
        let poller = self.poller.clone();
        let task_slot = Arc::clone(slot);
        let task_ticket = ticket.clone();

        let handle = tokio::spawn(async move {
            let lead_id = task_ticket.lead_id.as_str();
            match poller.poll(lead_id).await {
                Ok(outcome) => {
                    let merged = task_slot
                        .update(&task_ticket, |view| view.apply_validation(&outcome))
                        .await
                        .is_some();
                    if !merged {
                        return;
                    }
                    match outcome.status {
                        Some(ValidationStatus::Completed) => {
                            tracing::info!("✓ Profile validation complete for lead {}", lead_id)
                        }
                        Some(ValidationStatus::Skipped) => {
                            tracing::info!("Profile validation skipped for lead {}", lead_id)
                        }
                        _ => tracing::warn!(
                            "Profile validation for lead {} ended as {:?}: {}",
                            lead_id,
                            outcome.status,
                            outcome.failure_reason()
                        ),
                    }
                }
                Err(e) => {
                    tracing::error!("Profile validation for lead {} failed: {}", lead_id, e);
                    task_slot
                        .update(&task_ticket, |view| view.fail_validation(e.message()))
                        .await;
                }
            }
        });

        slot.track(ticket, handle.abort_handle()).await;
        handle
    }
}
