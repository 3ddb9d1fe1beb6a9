use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::controller::AppState;
use crate::notifier::telegram::TelegramConsole;
use crate::notifier::ConversationRef;
use crate::workflow::{ActionOutcome, ApprovalCoordinator, OperatorAction, ReplyOutcome, WorkflowError};

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/telegram-callback", post(telegram_callback))
        .route_layer(Extension(app_state.coordinator))
        .route_layer(Extension(app_state.console))
}

/// Inbound Telegram update envelope, trimmed to the parts the workflow reads.
#[derive(Deserialize, Clone, Debug)]
pub struct TelegramUpdate {
    pub callback_query: Option<CallbackQuery>,
    pub message: Option<IncomingMessage>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CallbackQuery {
    pub id: String,
    pub data: String,
    pub message: Option<PromptMessage>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PromptMessage {
    pub chat: Chat,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
    pub reply_to_message: Option<serde_json::Value>,
}

pub async fn telegram_callback(
    Extension(coordinator): Extension<Arc<ApprovalCoordinator>>,
    Extension(console): Extension<Arc<TelegramConsole>>,
    Json(update): Json<TelegramUpdate>,
) -> impl IntoResponse {
    if let Some(callback) = update.callback_query {
        let Some((action, reservation_id)) = parse_callback_token(&callback.data) else {
            warn!("Invalid callback data: {}", callback.data);
            return (
                StatusCode::BAD_REQUEST,
                json!({"status": "error", "message": "Invalid callback data"}).to_string(),
            ).into_response();
        };
        let Some(prompt) = callback.message else {
            warn!("Callback query {} carried no originating message", callback.id);
            return (
                StatusCode::BAD_REQUEST,
                json!({"status": "error", "message": "Invalid callback data"}).to_string(),
            ).into_response();
        };

        // Answer right away so the operator's button stops spinning even if
        // the workflow takes a moment.
        if let Err(e) = console
            .answer_callback(&callback.id, "Processing your request...")
            .await
        {
            warn!("Failed to answer callback query due to: {}", e);
        }

        let conversation = ConversationRef(prompt.chat.id.to_string());
        return match coordinator
            .handle_operator_action(action, reservation_id, conversation)
            .await
        {
            Ok(ActionOutcome::Confirmed(_)) => {
                (StatusCode::OK, json!({"status": "confirmed"}).to_string()).into_response()
            }
            Ok(ActionOutcome::ReasonRequested) => {
                (StatusCode::OK, json!({"status": "awaiting_reason"}).to_string()).into_response()
            }
            Ok(ActionOutcome::Stale) => {
                (StatusCode::OK, json!({"status": "ignored"}).to_string()).into_response()
            }
            Err(WorkflowError::NotFound(id)) => {
                warn!("Reservation not found: {}", id);
                (
                    StatusCode::NOT_FOUND,
                    json!({"status": "error", "message": "Reservation not found"}).to_string(),
                ).into_response()
            }
            Err(e) => {
                warn!("Something went wrong handling the operator action due to: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"status": "error", "message": "Internal server error"}).to_string(),
                ).into_response()
            }
        };
    }

    if let Some(message) = update.message {
        if message.reply_to_message.is_some() {
            let conversation = ConversationRef(message.chat.id.to_string());
            let text = message
                .text
                .unwrap_or_else(|| "No reason provided".to_string());

            return match coordinator.handle_operator_reply(conversation, &text).await {
                Ok(ReplyOutcome::Denied(_)) => {
                    (StatusCode::OK, json!({"status": "denied"}).to_string()).into_response()
                }
                Ok(ReplyOutcome::Ignored) => {
                    (StatusCode::OK, json!({"status": "ignored"}).to_string()).into_response()
                }
                Err(e) => {
                    warn!("Something went wrong handling the operator reply due to: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"status": "error", "message": "Internal server error"}).to_string(),
                    ).into_response()
                }
            };
        }
    }

    return (StatusCode::OK, json!({"status": "ignored"}).to_string()).into_response();
}

fn parse_callback_token(data: &str) -> Option<(OperatorAction, Uuid)> {
    let (action, reservation_id) = data.split_once('_')?;
    let action = match action {
        "accept" => OperatorAction::Accept,
        "deny" => OperatorAction::Deny,
        _ => return None,
    };
    let reservation_id = Uuid::parse_str(reservation_id).ok()?;
    Some((action, reservation_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_tokens_parse_into_actions() {
        let id = Uuid::new_v4();

        let (action, parsed) = parse_callback_token(&format!("accept_{}", id)).unwrap();
        assert_eq!(action, OperatorAction::Accept);
        assert_eq!(parsed, id);

        let (action, parsed) = parse_callback_token(&format!("deny_{}", id)).unwrap();
        assert_eq!(action, OperatorAction::Deny);
        assert_eq!(parsed, id);

        assert!(parse_callback_token(&format!("done_{}", id)).is_none());
        assert!(parse_callback_token("accept_not-a-uuid").is_none());
        assert!(parse_callback_token("garbage").is_none());
    }

    #[test]
    fn button_press_envelope_deserializes() {
        let id = Uuid::new_v4();
        let payload = json!({
            "update_id": 7,
            "callback_query": {
                "id": "cbq-1",
                "from": {"id": 99, "first_name": "Op"},
                "data": format!("deny_{}", id),
                "message": {
                    "message_id": 1001,
                    "chat": {"id": -4242, "type": "group"},
                    "text": "New Reservation Request:"
                }
            }
        });

        let update: TelegramUpdate = serde_json::from_value(payload).unwrap();
        let callback = update.callback_query.unwrap();
        assert_eq!(callback.data, format!("deny_{}", id));
        assert_eq!(callback.message.unwrap().chat.id, -4242);
        assert!(update.message.is_none());
    }

    #[test]
    fn reason_reply_envelope_deserializes() {
        let payload = json!({
            "update_id": 8,
            "message": {
                "message_id": 1002,
                "chat": {"id": -4242, "type": "group"},
                "text": "fully booked",
                "reply_to_message": {"message_id": 1001}
            }
        });

        let update: TelegramUpdate = serde_json::from_value(payload).unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.text.as_deref(), Some("fully booked"));
        assert!(message.reply_to_message.is_some());
    }

    #[test]
    fn plain_chat_message_is_not_a_reply() {
        let payload = json!({
            "update_id": 9,
            "message": {
                "message_id": 1003,
                "chat": {"id": -4242, "type": "group"},
                "text": "what's for lunch?"
            }
        });

        let update: TelegramUpdate = serde_json::from_value(payload).unwrap();
        assert!(update.message.unwrap().reply_to_message.is_none());
    }
}
