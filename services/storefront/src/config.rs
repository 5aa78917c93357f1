use serde::Deserialize;

use storefront_core::config::Config;

/// Storefront configuration loaded from environment variables.
///
/// Field names map to upper-cased env vars (`jwt_secret` → `JWT_SECRET`).
#[derive(Debug, Clone, Deserialize)]
pub struct StorefrontConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL.
    pub redis_url: String,
    /// HMAC secret for signing session tokens.
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    #[serde(default = "default_jwt_expires_in_secs")]
    pub jwt_expires_in_secs: u64,
    /// TCP port for `serve`.
    #[serde(default = "default_port")]
    pub storefront_port: u16,
    /// Name used in notification subjects and bodies.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_email_from")]
    pub email_from: String,
    /// Resend API key. Absent → emails are logged instead of sent.
    pub resend_api_key: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    /// Sender number for SMS, E.164.
    pub twilio_sms_from: Option<String>,
    /// Sender number for WhatsApp, E.164 without the `whatsapp:` prefix.
    pub twilio_whatsapp_from: Option<String>,
    /// Deliver phone OTPs over WhatsApp first, falling back to SMS once.
    #[serde(default = "default_true")]
    pub otp_phone_prefer_whatsapp: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub dispatch_poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub dispatch_batch_size: u64,
}

impl Config for StorefrontConfig {}

fn default_jwt_expires_in_secs() -> u64 {
    86_400
}

fn default_port() -> u16 {
    3000
}

fn default_app_name() -> String {
    "Ordering System".to_owned()
}

fn default_email_from() -> String {
    "onboarding@resend.dev".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> u64 {
    20
}
