use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::reservation::{Reservation, ReservationInput, ReservationStatus};
use crate::notifier::{ActionButton, ConversationRef, CustomerTemplate, NotificationChannel};
use crate::repositories::reservation_repo::{ReservationStore, StoreUpdateError};
use crate::workflow::pending::PendingDecisionTable;

pub mod pending;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Missing required field: {0}")]
    Validation(&'static str),

    #[error("Reservation {0} not found")]
    NotFound(Uuid),

    #[error("Storage unavailable: {0}")]
    Storage(#[source] anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorAction {
    Accept,
    Deny,
}

#[derive(Debug)]
pub enum ActionOutcome {
    Confirmed(Reservation),
    ReasonRequested,
    /// The reservation was already decided (or never known). Informational
    /// acknowledgment only, never an error the operator has to care about.
    Stale,
}

#[derive(Debug)]
pub enum ReplyOutcome {
    Denied(Reservation),
    /// The reply did not match any awaiting-reason binding, it is ordinary
    /// chat traffic.
    Ignored,
}

/// Owns the reservation state machine:
///
/// ```text
/// Pending --accept--> Confirmed            (terminal)
/// Pending --deny--> Pending[awaiting-reason] --reply--> Denied  (terminal)
/// ```
///
/// Decisions are only honored while a PendingDecision exists for the
/// reservation; removing it from the table is the commit point after which
/// any later action on the same id is stale.
pub struct ApprovalCoordinator {
    store: Arc<dyn ReservationStore>,
    channel: Arc<dyn NotificationChannel>,
    pending: PendingDecisionTable,
    reply_timeout: time::Duration,
    rebook_url_base: String,
}

impl ApprovalCoordinator {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        channel: Arc<dyn NotificationChannel>,
        reply_timeout: time::Duration,
        rebook_url_base: String,
    ) -> Self {
        Self {
            store,
            channel,
            pending: PendingDecisionTable::new(),
            reply_timeout,
            rebook_url_base,
        }
    }

    pub async fn submit(
        &self,
        input: ReservationInput,
    ) -> Result<Reservation, WorkflowError> {
        if let Some(field) = input.missing_field() {
            return Err(WorkflowError::Validation(field));
        }

        let reservation = self
            .store
            .create(&input)
            .await
            .map_err(WorkflowError::Storage)?;
        info!("Created reservation {} for {}", reservation.id, reservation.name);

        self.pending.insert(reservation.id);

        match self
            .channel
            .notify_operator(&operator_summary(&reservation), &decision_buttons(reservation.id))
            .await
        {
            Ok(receipt) => {
                if let Some(message_ref) = receipt.message_ref {
                    self.pending
                        .record_operator_message(reservation.id, message_ref);
                }
            }
            Err(e) => {
                warn!("Failed to notify operator about reservation {} due to: {}", reservation.id, e);
            }
        }

        if let Err(e) = self
            .channel
            .notify_customer(
                &reservation.email,
                CustomerTemplate::Received {
                    reservation: &reservation,
                },
            )
            .await
        {
            warn!("Failed to send receipt email for reservation {} due to: {}", reservation.id, e);
        }

        Ok(reservation)
    }

    pub async fn handle_operator_action(
        &self,
        action: OperatorAction,
        reservation_id: Uuid,
        conversation: ConversationRef,
    ) -> Result<ActionOutcome, WorkflowError> {
        match action {
            OperatorAction::Accept => self.accept(reservation_id, conversation).await,
            OperatorAction::Deny => self.begin_denial(reservation_id, conversation).await,
        }
    }

    async fn accept(
        &self,
        reservation_id: Uuid,
        conversation: ConversationRef,
    ) -> Result<ActionOutcome, WorkflowError> {
        let Some(decision) = self.pending.take(reservation_id) else {
            return self.acknowledge_stale(reservation_id, &conversation).await;
        };

        let reservation = match self
            .store
            .update_status(reservation_id, ReservationStatus::Confirmed, None)
            .await
        {
            Ok(reservation) => reservation,
            Err(StoreUpdateError::NotFound(id)) => return Err(WorkflowError::NotFound(id)),
            Err(StoreUpdateError::InvalidTransition { id, status }) => {
                // Row already left Pending through some other path; the table
                // entry was garbage and staying removed is correct.
                warn!("Accept on reservation {} ignored, row is already {:?}", id, status);
                return self.acknowledge_stale(reservation_id, &conversation).await;
            }
            Err(StoreUpdateError::Backend(e)) => {
                self.pending.reinstate(decision);
                return Err(WorkflowError::Storage(e));
            }
        };
        info!("Reservation {} confirmed", reservation.id);

        if let Some(message_ref) = &decision.operator_message {
            let card = format!("✅ Accepted\n{}", operator_summary(&reservation));
            if let Err(e) = self.channel.update_operator_card(message_ref, &card).await {
                warn!("Failed to update operator card for reservation {} due to: {}", reservation.id, e);
            }
        }

        if let Err(e) = self
            .channel
            .notify_customer(
                &reservation.email,
                CustomerTemplate::Confirmed {
                    reservation: &reservation,
                },
            )
            .await
        {
            warn!("Failed to send confirmation email for reservation {} due to: {}", reservation.id, e);
        }

        Ok(ActionOutcome::Confirmed(reservation))
    }

    async fn begin_denial(
        &self,
        reservation_id: Uuid,
        conversation: ConversationRef,
    ) -> Result<ActionOutcome, WorkflowError> {
        if !self.pending.contains(reservation_id) {
            return self.acknowledge_stale(reservation_id, &conversation).await;
        }

        let reservation = self
            .store
            .get(reservation_id)
            .await
            .map_err(WorkflowError::Storage)?;
        let Some(reservation) = reservation else {
            self.pending.take(reservation_id);
            return Err(WorkflowError::NotFound(reservation_id));
        };

        let bound = self.pending.bind_awaiting_reason(
            reservation_id,
            conversation.clone(),
            OffsetDateTime::now_utc(),
        );
        // Lost a race against another decision between the contains check and
        // here; the winner already committed.
        let Some(bound) = bound else {
            return self.acknowledge_stale(reservation_id, &conversation).await;
        };

        for superseded in &bound.superseded {
            warn!(
                "Denial prompt for reservation {} superseded by a newer deny in the same conversation",
                superseded
            );
        }

        if let Some(message_ref) = &bound.operator_message {
            let card = format!("🔄 Processing Denial\n{}", operator_summary(&reservation));
            if let Err(e) = self.channel.update_operator_card(message_ref, &card).await {
                warn!("Failed to update operator card for reservation {} due to: {}", reservation_id, e);
            }
        }

        if let Err(e) = self.channel.prompt_for_reason(&conversation).await {
            warn!("Failed to prompt for denial reason on reservation {} due to: {}", reservation_id, e);
        }

        Ok(ActionOutcome::ReasonRequested)
    }

    pub async fn handle_operator_reply(
        &self,
        conversation: ConversationRef,
        text: &str,
    ) -> Result<ReplyOutcome, WorkflowError> {
        let Some(decision) = self.pending.take_awaiting(&conversation) else {
            return Ok(ReplyOutcome::Ignored);
        };
        let reservation_id = decision.reservation_id;

        let reservation = match self
            .store
            .update_status(reservation_id, ReservationStatus::Denied, Some(text))
            .await
        {
            Ok(reservation) => reservation,
            Err(StoreUpdateError::NotFound(id)) => return Err(WorkflowError::NotFound(id)),
            Err(StoreUpdateError::InvalidTransition { id, status }) => {
                warn!("Denial reply for reservation {} ignored, row is already {:?}", id, status);
                return Ok(ReplyOutcome::Ignored);
            }
            Err(StoreUpdateError::Backend(e)) => {
                self.pending.reinstate(decision);
                return Err(WorkflowError::Storage(e));
            }
        };
        info!("Reservation {} denied: {}", reservation.id, text);

        if let Some(message_ref) = &decision.operator_message {
            let card = format!(
                "❌ Denied\n{}\nReason: {}",
                operator_summary(&reservation),
                text
            );
            if let Err(e) = self.channel.update_operator_card(message_ref, &card).await {
                warn!("Failed to update operator card for reservation {} due to: {}", reservation.id, e);
            }
        }

        let rebook_url = format!(
            "{}?reservation_id={}&token={}",
            self.rebook_url_base, reservation.id, reservation.token
        );
        if let Err(e) = self
            .channel
            .notify_customer(
                &reservation.email,
                CustomerTemplate::Denied {
                    reservation: &reservation,
                    reason: text,
                    rebook_url: &rebook_url,
                },
            )
            .await
        {
            warn!("Failed to send denial email for reservation {} due to: {}", reservation.id, e);
        }

        if let Err(e) = self
            .channel
            .acknowledge_operator(&conversation, "Reservation denied and the customer has been notified.")
            .await
        {
            warn!("Failed to acknowledge denial of reservation {} due to: {}", reservation.id, e);
        }

        Ok(ReplyOutcome::Denied(reservation))
    }

    /// Reverts awaiting-reason bindings older than the configured timeout so
    /// an abandoned deny prompt does not pin its conversation forever. The
    /// reservation stays Pending and the decision buttons keep working.
    pub async fn expire_stale_prompts(&self) -> usize {
        let cutoff = OffsetDateTime::now_utc() - self.reply_timeout;
        let expired = self.pending.clear_expired(cutoff);

        for (reservation_id, conversation) in &expired {
            warn!("Denial prompt for reservation {} expired without a reply", reservation_id);
            if let Err(e) = self
                .channel
                .acknowledge_operator(
                    conversation,
                    "The denial prompt timed out. Press Deny again to provide a reason.",
                )
                .await
            {
                warn!("Failed to notify operator about expired prompt for {} due to: {}", reservation_id, e);
            }
        }

        expired.len()
    }

    async fn acknowledge_stale(
        &self,
        reservation_id: Uuid,
        conversation: &ConversationRef,
    ) -> Result<ActionOutcome, WorkflowError> {
        if let Err(e) = self
            .channel
            .acknowledge_operator(conversation, "This reservation has already been handled.")
            .await
        {
            warn!("Failed to send stale-action notice for reservation {} due to: {}", reservation_id, e);
        }
        Ok(ActionOutcome::Stale)
    }
}

fn operator_summary(reservation: &Reservation) -> String {
    format!(
        "New Reservation Request:\n\
        Name: {}\n\
        Email: {}\n\
        Phone: {}\n\
        Date: {}\n\
        Time: {}\n\
        Diners: {}\n\
        Seating: {}\n\
        Pickup: {}",
        reservation.name,
        reservation.email,
        reservation.phone,
        reservation.date,
        reservation.time,
        reservation.diners,
        reservation.seating,
        reservation.pickup,
    )
}

fn decision_buttons(reservation_id: Uuid) -> Vec<ActionButton> {
    vec![
        ActionButton {
            label: "✅ Accept".to_string(),
            callback_token: format!("accept_{}", reservation_id),
        },
        ActionButton {
            label: "❌ Deny".to_string(),
            callback_token: format!("deny_{}", reservation_id),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{DeliveryError, DeliveryReceipt};
    use crate::repositories::memory_repo::MemoryReservationRepo;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ChannelEvent {
        OperatorNotified { summary: String, tokens: Vec<String> },
        CardUpdated { message_ref: String, text: String },
        ReasonPrompted { conversation: String },
        OperatorAcknowledged { conversation: String, text: String },
        CustomerEmailed { address: String, subject: String },
    }

    /// Records every send; delivery always succeeds.
    #[derive(Default)]
    struct RecordingChannel {
        events: Mutex<Vec<ChannelEvent>>,
    }

    impl RecordingChannel {
        fn events(&self) -> Vec<ChannelEvent> {
            self.events.lock().unwrap().clone()
        }

        fn customer_emails(&self) -> Vec<(String, String)> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    ChannelEvent::CustomerEmailed { address, subject } => Some((address, subject)),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, event: ChannelEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait::async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn notify_operator(
            &self,
            summary: &str,
            actions: &[ActionButton],
        ) -> Result<DeliveryReceipt, DeliveryError> {
            self.record(ChannelEvent::OperatorNotified {
                summary: summary.to_string(),
                tokens: actions.iter().map(|a| a.callback_token.clone()).collect(),
            });
            Ok(DeliveryReceipt {
                message_ref: Some("1001".to_string()),
            })
        }

        async fn update_operator_card(
            &self,
            message_ref: &str,
            text: &str,
        ) -> Result<(), DeliveryError> {
            self.record(ChannelEvent::CardUpdated {
                message_ref: message_ref.to_string(),
                text: text.to_string(),
            });
            Ok(())
        }

        async fn prompt_for_reason(
            &self,
            conversation: &ConversationRef,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            self.record(ChannelEvent::ReasonPrompted {
                conversation: conversation.0.clone(),
            });
            Ok(DeliveryReceipt::default())
        }

        async fn acknowledge_operator(
            &self,
            conversation: &ConversationRef,
            text: &str,
        ) -> Result<(), DeliveryError> {
            self.record(ChannelEvent::OperatorAcknowledged {
                conversation: conversation.0.clone(),
                text: text.to_string(),
            });
            Ok(())
        }

        async fn notify_customer(
            &self,
            address: &str,
            template: CustomerTemplate<'_>,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            let subject = match template {
                CustomerTemplate::Received { .. } => "Received",
                CustomerTemplate::Confirmed { .. } => "Confirmed",
                CustomerTemplate::Denied { .. } => "Denied",
            };
            self.record(ChannelEvent::CustomerEmailed {
                address: address.to_string(),
                subject: subject.to_string(),
            });
            Ok(DeliveryReceipt::default())
        }
    }

    /// Store wrapper that fails the next status update with a backend error.
    struct FlakyStore {
        inner: Arc<MemoryReservationRepo>,
        fail_next_update: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ReservationStore for FlakyStore {
        async fn create(&self, input: &ReservationInput) -> anyhow::Result<Reservation> {
            self.inner.create(input).await
        }

        async fn get(&self, id: Uuid) -> anyhow::Result<Option<Reservation>> {
            self.inner.get(id).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            status: ReservationStatus,
            denial_reason: Option<&str>,
        ) -> Result<Reservation, StoreUpdateError> {
            if self.fail_next_update.swap(false, Ordering::SeqCst) {
                return Err(StoreUpdateError::Backend(anyhow::anyhow!(
                    "connection reset"
                )));
            }
            self.inner.update_status(id, status, denial_reason).await
        }

        async fn list(&self) -> anyhow::Result<Vec<Reservation>> {
            self.inner.list().await
        }
    }

    fn sample_input(name: &str, email: &str) -> ReservationInput {
        ReservationInput {
            name: name.to_string(),
            email: email.to_string(),
            phone: "555".to_string(),
            date: "2025-01-10".to_string(),
            time: "7:00 PM".to_string(),
            diners: "2".to_string(),
            seating: "inside".to_string(),
            pickup: "no".to_string(),
        }
    }

    fn coordinator_with(
        store: Arc<dyn ReservationStore>,
        channel: Arc<RecordingChannel>,
        reply_timeout: time::Duration,
    ) -> ApprovalCoordinator {
        ApprovalCoordinator::new(
            store,
            channel,
            reply_timeout,
            "https://example.com/rebook".to_string(),
        )
    }

    fn setup() -> (Arc<MemoryReservationRepo>, Arc<RecordingChannel>, ApprovalCoordinator) {
        let store = Arc::new(MemoryReservationRepo::new());
        let channel = Arc::new(RecordingChannel::default());
        let coordinator = coordinator_with(
            store.clone(),
            channel.clone(),
            time::Duration::minutes(15),
        );
        (store, channel, coordinator)
    }

    fn conversation(id: &str) -> ConversationRef {
        ConversationRef(id.to_string())
    }

    #[tokio::test]
    async fn submit_creates_pending_reservation_and_notifies() {
        let (store, channel, coordinator) = setup();

        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();

        let stored = store.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);

        let events = channel.events();
        match &events[0] {
            ChannelEvent::OperatorNotified { summary, tokens } => {
                assert!(summary.contains("Name: A"));
                assert_eq!(
                    tokens,
                    &vec![
                        format!("accept_{}", reservation.id),
                        format!("deny_{}", reservation.id)
                    ]
                );
            }
            other => panic!("expected operator notification first, got {:?}", other),
        }
        assert_eq!(
            channel.customer_emails(),
            vec![("a@x.com".to_string(), "Received".to_string())]
        );
    }

    #[tokio::test]
    async fn submit_rejects_missing_fields_without_side_effects() {
        let (store, channel, coordinator) = setup();

        let mut input = sample_input("A", "a@x.com");
        input.email = String::new();

        let err = coordinator.submit(input).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation("email")));
        assert!(store.list().await.unwrap().is_empty());
        assert!(channel.events().is_empty());
    }

    #[tokio::test]
    async fn accept_confirms_and_second_accept_is_stale() {
        let (store, channel, coordinator) = setup();
        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();

        let outcome = coordinator
            .handle_operator_action(OperatorAction::Accept, reservation.id, conversation("op"))
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Confirmed(_)));
        assert_eq!(
            store.get(reservation.id).await.unwrap().unwrap().status,
            ReservationStatus::Confirmed
        );

        let outcome = coordinator
            .handle_operator_action(OperatorAction::Accept, reservation.id, conversation("op"))
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Stale));

        // One Received and exactly one Confirmed email, the stale accept sent nothing.
        let subjects: Vec<String> = channel
            .customer_emails()
            .into_iter()
            .map(|(_, subject)| subject)
            .collect();
        assert_eq!(subjects, vec!["Received".to_string(), "Confirmed".to_string()]);
    }

    #[tokio::test]
    async fn deny_requires_prompt_then_reply() {
        let (store, channel, coordinator) = setup();
        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();

        let outcome = coordinator
            .handle_operator_action(OperatorAction::Deny, reservation.id, conversation("op"))
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::ReasonRequested));
        // Still pending while the reason is outstanding.
        assert_eq!(
            store.get(reservation.id).await.unwrap().unwrap().status,
            ReservationStatus::Pending
        );
        assert!(channel
            .events()
            .contains(&ChannelEvent::ReasonPrompted {
                conversation: "op".to_string()
            }));

        let outcome = coordinator
            .handle_operator_reply(conversation("op"), "fully booked")
            .await
            .unwrap();
        let ReplyOutcome::Denied(denied) = outcome else {
            panic!("expected denial");
        };
        assert_eq!(denied.denial_reason.as_deref(), Some("fully booked"));

        let stored = store.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Denied);
        assert_eq!(stored.denial_reason.as_deref(), Some("fully booked"));
        assert_eq!(
            channel.customer_emails().last().unwrap().1,
            "Denied".to_string()
        );
    }

    #[tokio::test]
    async fn reply_from_unbound_conversation_is_ignored() {
        let (store, _channel, coordinator) = setup();
        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();

        coordinator
            .handle_operator_action(OperatorAction::Deny, reservation.id, conversation("op-1"))
            .await
            .unwrap();

        let outcome = coordinator
            .handle_operator_reply(conversation("op-2"), "not my reservation")
            .await
            .unwrap();
        assert!(matches!(outcome, ReplyOutcome::Ignored));
        assert_eq!(
            store.get(reservation.id).await.unwrap().unwrap().status,
            ReservationStatus::Pending
        );
    }

    #[tokio::test]
    async fn concurrent_denials_never_cross_wire_reasons() {
        let (store, channel, coordinator) = setup();
        let coordinator = Arc::new(coordinator);

        let a = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();
        let b = coordinator
            .submit(sample_input("B", "b@x.com"))
            .await
            .unwrap();

        let deny_a = {
            let coordinator = coordinator.clone();
            let id = a.id;
            tokio::spawn(async move {
                coordinator
                    .handle_operator_action(OperatorAction::Deny, id, conversation("chat-a"))
                    .await
                    .unwrap();
                coordinator
                    .handle_operator_reply(conversation("chat-a"), "reason A")
                    .await
                    .unwrap()
            })
        };
        let deny_b = {
            let coordinator = coordinator.clone();
            let id = b.id;
            tokio::spawn(async move {
                coordinator
                    .handle_operator_action(OperatorAction::Deny, id, conversation("chat-b"))
                    .await
                    .unwrap();
                coordinator
                    .handle_operator_reply(conversation("chat-b"), "reason B")
                    .await
                    .unwrap()
            })
        };
        assert!(matches!(deny_a.await.unwrap(), ReplyOutcome::Denied(_)));
        assert!(matches!(deny_b.await.unwrap(), ReplyOutcome::Denied(_)));

        let stored_a = store.get(a.id).await.unwrap().unwrap();
        let stored_b = store.get(b.id).await.unwrap().unwrap();
        assert_eq!(stored_a.denial_reason.as_deref(), Some("reason A"));
        assert_eq!(stored_b.denial_reason.as_deref(), Some("reason B"));

        let denial_emails = channel
            .customer_emails()
            .into_iter()
            .filter(|(_, subject)| subject == "Denied")
            .count();
        assert_eq!(denial_emails, 2);
    }

    #[tokio::test]
    async fn expired_prompt_reverts_and_late_reply_is_ignored() {
        let store = Arc::new(MemoryReservationRepo::new());
        let channel = Arc::new(RecordingChannel::default());
        // Zero timeout: every outstanding prompt is expired on the next sweep.
        let coordinator =
            coordinator_with(store.clone(), channel.clone(), time::Duration::ZERO);

        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();
        coordinator
            .handle_operator_action(OperatorAction::Deny, reservation.id, conversation("op"))
            .await
            .unwrap();

        assert_eq!(coordinator.expire_stale_prompts().await, 1);
        assert_eq!(coordinator.expire_stale_prompts().await, 0);

        let outcome = coordinator
            .handle_operator_reply(conversation("op"), "too late")
            .await
            .unwrap();
        assert!(matches!(outcome, ReplyOutcome::Ignored));
        assert_eq!(
            store.get(reservation.id).await.unwrap().unwrap().status,
            ReservationStatus::Pending
        );

        // A fresh deny re-binds the same conversation and completes normally.
        coordinator
            .handle_operator_action(OperatorAction::Deny, reservation.id, conversation("op"))
            .await
            .unwrap();
        let outcome = coordinator
            .handle_operator_reply(conversation("op"), "fully booked")
            .await
            .unwrap();
        assert!(matches!(outcome, ReplyOutcome::Denied(_)));
    }

    #[tokio::test]
    async fn action_on_unknown_reservation_is_stale() {
        let (_store, channel, coordinator) = setup();

        let outcome = coordinator
            .handle_operator_action(OperatorAction::Accept, Uuid::new_v4(), conversation("op"))
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Stale));
        assert!(channel.customer_emails().is_empty());
    }

    #[tokio::test]
    async fn accept_with_vanished_row_is_not_found() {
        let (store, channel, coordinator) = setup();
        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();

        store.remove(reservation.id);

        let err = coordinator
            .handle_operator_action(OperatorAction::Accept, reservation.id, conversation("op"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
        // No customer notification beyond the submission receipt.
        assert_eq!(channel.customer_emails().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_reinstates_the_decision_for_retry() {
        let inner = Arc::new(MemoryReservationRepo::new());
        let store = Arc::new(FlakyStore {
            inner: inner.clone(),
            fail_next_update: AtomicBool::new(false),
        });
        let channel = Arc::new(RecordingChannel::default());
        let coordinator = coordinator_with(
            store.clone(),
            channel.clone(),
            time::Duration::minutes(15),
        );

        let reservation = coordinator
            .submit(sample_input("A", "a@x.com"))
            .await
            .unwrap();

        store.fail_next_update.store(true, Ordering::SeqCst);
        let err = coordinator
            .handle_operator_action(OperatorAction::Accept, reservation.id, conversation("op"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));
        assert_eq!(
            inner.get(reservation.id).await.unwrap().unwrap().status,
            ReservationStatus::Pending
        );

        // The retry finds the reinstated decision and succeeds.
        let outcome = coordinator
            .handle_operator_action(OperatorAction::Accept, reservation.id, conversation("op"))
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Confirmed(_)));
    }
}
