use crate::view_state::LeadView;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Explicit session value handed to every view operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
}

/// Proof that a result belongs to a specific view activation.
///
/// Results carrying a ticket from an older activation are dropped on merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTicket {
    pub lead_id: String,
    epoch: u64,
}

#[derive(Default)]
struct ActiveView {
    epoch: u64,
    view: Option<LeadView>,
    tasks: Vec<AbortHandle>,
}

/// The single lead-detail view owned by one session.
#[derive(Default)]
pub struct ViewSlot {
    inner: RwLock<ActiveView>,
}

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new activation for `lead_id`, cancelling everything the previous one
    /// still had in flight.
    pub async fn activate(&self, lead_id: &str) -> ViewTicket {
        let mut active = self.inner.write().await;
        let cancelled = active.tasks.len();
        for task in active.tasks.drain(..) {
            task.abort();
        }
        active.epoch += 1;
        active.view = Some(LeadView::loading(lead_id));

        tracing::debug!(
            "Activated view for lead {} (epoch {}, {} task(s) cancelled)",
            lead_id,
            active.epoch,
            cancelled
        );
        ViewTicket {
            lead_id: lead_id.to_string(),
            epoch: active.epoch,
        }
    }

    /// Applies `merge` to the view if `ticket` is still the live activation.
    ///
    /// # Returns
    ///
    /// * `Option<R>` - `None` when the result was stale and discarded.
    pub async fn update<F, R>(&self, ticket: &ViewTicket, merge: F) -> Option<R>
    where
        F: FnOnce(&mut LeadView) -> R,
    {
        let mut active = self.inner.write().await;
        if active.epoch != ticket.epoch {
            tracing::debug!(
                "Discarding stale result for lead {} (epoch {}, current {})",
                ticket.lead_id,
                ticket.epoch,
                active.epoch
            );
            return None;
        }
        match active.view.as_mut() {
            Some(view) if view.lead_id == ticket.lead_id => Some(merge(view)),
            _ => None,
        }
    }

    /// Registers a spawned task so the next activation can cancel it.
    pub async fn track(&self, ticket: &ViewTicket, task: AbortHandle) {
        let mut active = self.inner.write().await;
        if active.epoch != ticket.epoch {
            task.abort();
            return;
        }
        active.tasks.retain(|t| !t.is_finished());
        active.tasks.push(task);
    }

    pub async fn snapshot(&self) -> Option<LeadView> {
        self.inner.read().await.view.clone()
    }

    /// Ticket and snapshot of the live activation, if any.
    pub async fn current(&self) -> Option<(ViewTicket, LeadView)> {
        let active = self.inner.read().await;
        active.view.as_ref().map(|view| {
            (
                ViewTicket {
                    lead_id: view.lead_id.clone(),
                    epoch: active.epoch,
                },
                view.clone(),
            )
        })
    }
}

/// Session id -> view slot, expiring idle sessions.
#[derive(Clone)]
pub struct ViewRegistry {
    slots: Cache<String, Arc<ViewSlot>>,
}

impl ViewRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        let slots = Cache::builder()
            .time_to_idle(idle_ttl)
            .max_capacity(10_000)
            .build();
        Self { slots }
    }

    pub async fn create_session(&self) -> SessionContext {
        let session_id = Uuid::new_v4().to_string();
        self.slots
            .insert(session_id.clone(), Arc::new(ViewSlot::new()))
            .await;
        tracing::info!("Session {} created", session_id);
        SessionContext { session_id }
    }

    /// Resolves a session id sent by a client.
    pub async fn session(&self, session_id: &str) -> Option<SessionContext> {
        self.slots
            .contains_key(session_id)
            .then(|| SessionContext {
                session_id: session_id.to_string(),
            })
    }

    pub async fn slot(&self, session: &SessionContext) -> Option<Arc<ViewSlot>> {
        self.slots.get(&session.session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationOutcome;

    #[tokio::test]
    async fn test_stale_ticket_is_discarded() {
        let slot = ViewSlot::new();
        let first = slot.activate("L1").await;
        let second = slot.activate("L2").await;

        assert!(slot.update(&second, |view| view.lead_id.clone()).await.is_some());

        let merged = slot
            .update(&first, |view| view.apply_validation(&ValidationOutcome::default()))
            .await;
        assert!(merged.is_none());

        let view = slot.snapshot().await.unwrap();
        assert_eq!(view.lead_id, "L2");
        assert!(view.validation.last_error.is_none());
    }

    #[tokio::test]
    async fn test_reopening_same_lead_invalidates_old_ticket() {
        let slot = ViewSlot::new();
        let first = slot.activate("L1").await;
        let second = slot.activate("L1").await;

        assert!(slot.update(&first, |_| ()).await.is_none());
        assert!(slot.update(&second, |_| ()).await.is_some());
    }

    #[tokio::test]
    async fn test_activation_aborts_tracked_tasks() {
        let slot = ViewSlot::new();
        let ticket = slot.activate("L1").await;
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        slot.track(&ticket, task.abort_handle()).await;

        slot.activate("L2").await;
        let err = task.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_registry_sessions() {
        let registry = ViewRegistry::new(Duration::from_secs(60));
        let session = registry.create_session().await;

        assert_eq!(
            registry.session(&session.session_id).await,
            Some(session.clone())
        );
        assert!(registry.slot(&session).await.is_some());
        assert!(registry.session("unknown").await.is_none());
    }
}
