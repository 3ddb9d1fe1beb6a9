use std::collections::HashMap;
use std::sync::Mutex;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::notifier::ConversationRef;

/// Correlation record for one outstanding operator prompt. Lives only between
/// the decision message going out and the decision being finalized.
#[derive(Clone, Debug)]
pub struct PendingDecision {
    pub reservation_id: Uuid,
    pub operator_message: Option<String>,
    pub awaiting_reason: Option<AwaitingReason>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct AwaitingReason {
    pub conversation: ConversationRef,
    pub prompted_at: OffsetDateTime,
}

pub struct BoundPrompt {
    pub operator_message: Option<String>,
    /// Reservations in the same conversation whose awaiting-reason binding was
    /// dropped in favour of this one.
    pub superseded: Vec<Uuid>,
}

/// The only mutable shared state in the approval core: reservation id to
/// outstanding decision. Every operation is one short lock acquisition, no
/// await is ever held across the mutex.
#[derive(Default)]
pub struct PendingDecisionTable {
    entries: Mutex<HashMap<Uuid, PendingDecision>>,
}

impl PendingDecisionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, reservation_id: Uuid) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            reservation_id,
            PendingDecision {
                reservation_id,
                operator_message: None,
                awaiting_reason: None,
                created_at: OffsetDateTime::now_utc(),
            },
        );
    }

    pub fn record_operator_message(&self, reservation_id: Uuid, message_ref: String) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&reservation_id) {
            entry.operator_message = Some(message_ref);
        }
    }

    pub fn contains(&self, reservation_id: Uuid) -> bool {
        self.entries.lock().unwrap().contains_key(&reservation_id)
    }

    /// Atomic check-and-clear, the commit point of a decision. The first of
    /// two racing actions wins the entry; the loser sees None and is stale.
    pub fn take(&self, reservation_id: Uuid) -> Option<PendingDecision> {
        self.entries.lock().unwrap().remove(&reservation_id)
    }

    /// Undo a `take` whose follow-up store write failed, so the operator can
    /// retry the action.
    pub fn reinstate(&self, decision: PendingDecision) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(decision.reservation_id).or_insert(decision);
    }

    /// Marks the entry as awaiting a denial reason from `conversation`. A
    /// conversation can only ever await one reason at a time, any earlier
    /// binding it held is dropped and reported back for logging.
    pub fn bind_awaiting_reason(
        &self,
        reservation_id: Uuid,
        conversation: ConversationRef,
        now: OffsetDateTime,
    ) -> Option<BoundPrompt> {
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(&reservation_id) {
            return None;
        }

        let mut superseded = Vec::new();
        for (other_id, entry) in entries.iter_mut() {
            if *other_id == reservation_id {
                continue;
            }
            let held_by_conversation = entry
                .awaiting_reason
                .as_ref()
                .map_or(false, |awaiting| awaiting.conversation == conversation);
            if held_by_conversation {
                entry.awaiting_reason = None;
                superseded.push(*other_id);
            }
        }

        let entry = entries.get_mut(&reservation_id)?;
        entry.awaiting_reason = Some(AwaitingReason {
            conversation,
            prompted_at: now,
        });

        Some(BoundPrompt {
            operator_message: entry.operator_message.clone(),
            superseded,
        })
    }

    /// Finds and removes the entry whose awaiting-reason binding matches the
    /// replying conversation. Unmatched conversations get None, their replies
    /// are ordinary chat noise.
    pub fn take_awaiting(&self, conversation: &ConversationRef) -> Option<PendingDecision> {
        let mut entries = self.entries.lock().unwrap();
        let reservation_id = entries
            .iter()
            .find(|(_, entry)| {
                entry
                    .awaiting_reason
                    .as_ref()
                    .map_or(false, |awaiting| &awaiting.conversation == conversation)
            })
            .map(|(id, _)| *id)?;

        entries.remove(&reservation_id)
    }

    /// Drops awaiting-reason bindings prompted at or before `cutoff`. The
    /// entries themselves stay, the operator card's buttons keep working and
    /// a late reply no longer matches anything.
    pub fn clear_expired(&self, cutoff: OffsetDateTime) -> Vec<(Uuid, ConversationRef)> {
        let mut entries = self.entries.lock().unwrap();
        let mut expired = Vec::new();
        for (reservation_id, entry) in entries.iter_mut() {
            let timed_out = entry
                .awaiting_reason
                .as_ref()
                .map_or(false, |awaiting| awaiting.prompted_at <= cutoff);
            if timed_out {
                if let Some(awaiting) = entry.awaiting_reason.take() {
                    expired.push((*reservation_id, awaiting.conversation));
                }
            }
        }
        expired
    }
}
