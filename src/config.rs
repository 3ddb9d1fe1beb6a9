use clap::Parser;

#[derive(Parser, Clone)]
pub struct Config {
    #[clap(env, long)]
    pub environment: String,

    #[clap(env, long, default_value = "3000")]
    pub port: u16,

    #[clap(env, long, default_value = "postgresql://localhost/reservations")]
    pub database_url: String,

    #[clap(env, long, default_value = "http://localhost:19006")]
    pub origin_urls: String,

    #[clap(env, long)]
    pub telegram_bot_token: String,

    #[clap(env, long)]
    pub telegram_chat_id: String,

    #[clap(env, long, default_value = "smtp.sendgrid.net")]
    pub mail_server: String,

    #[clap(env, long, default_value = "587")]
    pub mail_port: u16,

    #[clap(env, long)]
    pub mail_username: String,

    #[clap(env, long)]
    pub mail_password: String,

    #[clap(env, long, default_value = "no-reply@reservations.com")]
    pub sender_email: String,

    #[clap(env, long, default_value = "https://snack.expo.dev/@beachbar/la-casita-booking")]
    pub rebook_url_base: String,

    /// How long a deny prompt may wait for its reason before the binding is
    /// dropped and the decision has to be re-initiated.
    #[clap(env, long, default_value = "900")]
    pub deny_reply_timeout_secs: u64,

    #[clap(env, long, default_value = "60")]
    pub expiry_sweep_interval_secs: u64,
}
