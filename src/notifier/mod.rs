use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::reservation::Reservation;
use crate::notifier::email::{render_customer_template, Mailer};
use crate::notifier::telegram::TelegramConsole;

pub mod email;
pub mod telegram;

/// Opaque identifier of the operator chat session an action came from. Replies
/// are only ever matched against the conversation that prompted for them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationRef(pub String);

#[derive(Clone, Debug)]
pub struct ActionButton {
    pub label: String,
    pub callback_token: String,
}

/// Acknowledgment that a notification was handed to its transport. Does not
/// guarantee the recipient read it.
#[derive(Clone, Debug, Default)]
pub struct DeliveryReceipt {
    pub message_ref: Option<String>,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Operator console delivery failed: {0}")]
    Console(#[source] anyhow::Error),

    #[error("Email delivery failed: {0}")]
    Email(#[source] anyhow::Error),
}

#[derive(Clone, Debug)]
pub enum CustomerTemplate<'a> {
    Received {
        reservation: &'a Reservation,
    },
    Confirmed {
        reservation: &'a Reservation,
    },
    Denied {
        reservation: &'a Reservation,
        reason: &'a str,
        rebook_url: &'a str,
    },
}

/// Send primitives the approval workflow drives. Delivery is fire-and-forget
/// from the workflow's perspective: a failure is surfaced to the caller for
/// logging but never rolls back the state transition that triggered it, and a
/// retry may duplicate delivery.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify_operator(
        &self,
        summary: &str,
        actions: &[ActionButton],
    ) -> Result<DeliveryReceipt, DeliveryError>;

    async fn update_operator_card(
        &self,
        message_ref: &str,
        text: &str,
    ) -> Result<(), DeliveryError>;

    async fn prompt_for_reason(
        &self,
        conversation: &ConversationRef,
    ) -> Result<DeliveryReceipt, DeliveryError>;

    async fn acknowledge_operator(
        &self,
        conversation: &ConversationRef,
        text: &str,
    ) -> Result<(), DeliveryError>;

    async fn notify_customer(
        &self,
        address: &str,
        template: CustomerTemplate<'_>,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Production channel: Telegram for the operator console, SMTP for customers.
pub struct LiveChannel {
    console: Arc<TelegramConsole>,
    mailer: Mailer,
}

impl LiveChannel {
    pub fn new(console: Arc<TelegramConsole>, mailer: Mailer) -> Self {
        Self { console, mailer }
    }
}

#[async_trait]
impl NotificationChannel for LiveChannel {
    async fn notify_operator(
        &self,
        summary: &str,
        actions: &[ActionButton],
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let message_id = self
            .console
            .send_decision_message(summary, actions)
            .await
            .map_err(DeliveryError::Console)?;

        Ok(DeliveryReceipt {
            message_ref: Some(message_id),
        })
    }

    async fn update_operator_card(
        &self,
        message_ref: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.console
            .edit_message(message_ref, text)
            .await
            .map_err(DeliveryError::Console)
    }

    async fn prompt_for_reason(
        &self,
        conversation: &ConversationRef,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.console
            .send_force_reply(&conversation.0, "Please provide a reason for denial:")
            .await
            .map_err(DeliveryError::Console)?;

        Ok(DeliveryReceipt::default())
    }

    async fn acknowledge_operator(
        &self,
        conversation: &ConversationRef,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.console
            .send_text(&conversation.0, text)
            .await
            .map_err(DeliveryError::Console)
    }

    async fn notify_customer(
        &self,
        address: &str,
        template: CustomerTemplate<'_>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let (subject, body) = render_customer_template(&template);
        self.mailer
            .send_html(address, subject, body)
            .await
            .map_err(DeliveryError::Email)?;

        Ok(DeliveryReceipt::default())
    }
}
