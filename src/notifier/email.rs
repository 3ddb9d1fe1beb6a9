use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::notifier::CustomerTemplate;

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl Mailer {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            config.mail_username.clone(),
            config.mail_password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.mail_server)
            .context("Error building the SMTP transport")?
            .port(config.mail_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            sender: config.sender_email.clone(),
        })
    }

    pub async fn send_html(
        &self,
        to: &str,
        subject: &str,
        body: String,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.sender.parse().context("Invalid sender address")?)
            .to(to.parse().context("Invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

pub fn render_customer_template(template: &CustomerTemplate<'_>) -> (&'static str, String) {
    match template {
        CustomerTemplate::Received { reservation } => (
            "Reservation Request Received",
            format!(
                "Hello {},<br><br>\
                We've received your reservation request for {} at {}.<br><br>\
                You will receive an email soon with your reservation confirmation.",
                reservation.name, reservation.date, reservation.time
            ),
        ),
        CustomerTemplate::Confirmed { reservation } => (
            "Reservation Confirmed",
            format!(
                "Hello {},<br><br>\
                Your reservation has been confirmed. We look forward to seeing you at {} on {}.<br><br>",
                reservation.name, reservation.time, reservation.date
            ),
        ),
        CustomerTemplate::Denied {
            reservation,
            reason,
            rebook_url,
        } => (
            "Reservation Denied",
            format!(
                "Hello {},<br><br>\
                Sorry, we cannot take your reservation request for {} at {}.<br><br>\
                Reason: {}<br><br>\
                Click the button below to book a new time with your previous details:<br><br>\
                <a href=\"{}\" style=\"background-color: #4CAF50; color: white; padding: 10px 20px; \
                text-align: center; text-decoration: none; display: inline-block; border-radius: 5px;\">\
                Book A New Time</a><br><br>\
                Please contact us if you have any questions.",
                reservation.name, reservation.date, reservation.time, reason, rebook_url
            ),
        ),
    }
}
