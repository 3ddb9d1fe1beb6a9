use anyhow::{anyhow, Context};
use serde_json::{json, Value};

use crate::notifier::ActionButton;

const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const EDIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Thin client over the Telegram Bot API. Decision prompts always go to the
/// configured operator chat; follow-ups are addressed to whichever chat the
/// operator acted from.
pub struct TelegramConsole {
    http: reqwest::Client,
    api_base: String,
    operator_chat_id: String,
}

impl TelegramConsole {
    pub fn new(bot_token: &str, operator_chat_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: format!("https://api.telegram.org/bot{}", bot_token),
            operator_chat_id: operator_chat_id.to_string(),
        }
    }

    pub async fn send_decision_message(
        &self,
        text: &str,
        buttons: &[ActionButton],
    ) -> anyhow::Result<String> {
        let keyboard: Vec<Value> = buttons
            .iter()
            .map(|button| json!({"text": button.label, "callback_data": button.callback_token}))
            .collect();

        let response = self.http
            .post(format!("{}/sendMessage", self.api_base))
            .timeout(SEND_TIMEOUT)
            .json(&json!({
                "chat_id": self.operator_chat_id,
                "text": text,
                "reply_markup": {"inline_keyboard": [keyboard]}
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let message_id = body["result"]["message_id"]
            .as_i64()
            .ok_or_else(|| anyhow!("Telegram response carried no message_id"))?;

        Ok(message_id.to_string())
    }

    /// Rewrites a previously sent decision message. Telegram drops the inline
    /// keyboard when no new markup is supplied, which retires the buttons.
    pub async fn edit_message(
        &self,
        message_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        let message_id: i64 = message_id
            .parse()
            .context("Operator message ref is not a Telegram message id")?;

        self.http
            .post(format!("{}/editMessageText", self.api_base))
            .timeout(EDIT_TIMEOUT)
            .json(&json!({
                "chat_id": self.operator_chat_id,
                "message_id": message_id,
                "text": text
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn send_force_reply(
        &self,
        chat_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        self.http
            .post(format!("{}/sendMessage", self.api_base))
            .timeout(SEND_TIMEOUT)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "reply_markup": {"force_reply": true}
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        self.http
            .post(format!("{}/sendMessage", self.api_base))
            .timeout(SEND_TIMEOUT)
            .json(&json!({"chat_id": chat_id, "text": text}))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Telegram shows a spinner on the pressed button until the callback query
    /// is answered, so this is fired before any workflow processing happens.
    pub async fn answer_callback(
        &self,
        callback_query_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        self.http
            .post(format!("{}/answerCallbackQuery", self.api_base))
            .timeout(EDIT_TIMEOUT)
            .json(&json!({"callback_query_id": callback_query_id, "text": text}))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
