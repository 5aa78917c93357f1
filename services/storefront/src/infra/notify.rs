//! Outbound delivery over provider HTTP APIs.
//!
//! Email goes through Resend, SMS and WhatsApp through the Twilio Messages API.
//! A channel whose provider is not configured at all falls back to logging the
//! message, which keeps local development usable without credentials.

use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::config::StorefrontConfig;
use crate::domain::notification::{DeliveryChannel, Message};
use crate::domain::repository::NotificationSender;
use crate::error::StorefrontError;

const RESEND_URL: &str = "https://api.resend.com/emails";
const TWILIO_BASE_URL: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub sms_from: Option<String>,
    pub whatsapp_from: Option<String>,
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TwilioMessage<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
}

#[derive(Clone)]
pub struct HttpNotificationSender {
    pub client: reqwest::Client,
    pub resend: Option<ResendConfig>,
    pub twilio: Option<TwilioConfig>,
}

impl HttpNotificationSender {
    pub fn from_config(config: &StorefrontConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to create HTTP client")?;

        let resend = config.resend_api_key.clone().map(|api_key| ResendConfig {
            api_key,
            from: config.email_from.clone(),
        });
        let twilio = match (&config.twilio_account_sid, &config.twilio_auth_token) {
            (Some(sid), Some(token)) => Some(TwilioConfig {
                account_sid: sid.clone(),
                auth_token: token.clone(),
                sms_from: config.twilio_sms_from.clone(),
                whatsapp_from: config.twilio_whatsapp_from.clone(),
            }),
            _ => None,
        };

        if resend.is_none() {
            tracing::warn!("RESEND_API_KEY not set, emails will be logged instead of sent");
        }
        if twilio.is_none() {
            tracing::warn!("Twilio credentials not set, SMS and WhatsApp will be logged instead of sent");
        }

        Ok(Self {
            client,
            resend,
            twilio,
        })
    }

    async fn send_email(&self, resend: &ResendConfig, message: &Message) -> anyhow::Result<()> {
        self.client
            .post(RESEND_URL)
            .bearer_auth(&resend.api_key)
            .json(&ResendEmail {
                from: &resend.from,
                to: [message.to.as_str()],
                subject: &message.subject,
                text: &message.body,
            })
            .send()
            .await
            .context("resend request")?
            .error_for_status()
            .context("resend rejected email")?;
        Ok(())
    }

    async fn send_twilio(
        &self,
        twilio: &TwilioConfig,
        to: &str,
        from: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let url = format!(
            "{TWILIO_BASE_URL}/Accounts/{}/Messages.json",
            twilio.account_sid
        );
        self.client
            .post(url)
            .basic_auth(&twilio.account_sid, Some(&twilio.auth_token))
            .form(&TwilioMessage { to, from, body })
            .send()
            .await
            .context("twilio request")?
            .error_for_status()
            .context("twilio rejected message")?;
        Ok(())
    }

    async fn dispatch(&self, message: &Message) -> anyhow::Result<()> {
        match message.channel {
            DeliveryChannel::Email => match &self.resend {
                Some(resend) => self.send_email(resend, message).await,
                None => {
                    log_only(message);
                    Ok(())
                }
            },
            DeliveryChannel::Sms => match &self.twilio {
                Some(twilio) => {
                    let from = twilio
                        .sms_from
                        .as_deref()
                        .context("TWILIO_SMS_FROM not configured")?;
                    self.send_twilio(twilio, &message.to, from, &message.body)
                        .await
                }
                None => {
                    log_only(message);
                    Ok(())
                }
            },
            DeliveryChannel::WhatsApp => match &self.twilio {
                // Missing WhatsApp sender is an error so the SMS fallback runs.
                Some(twilio) => {
                    let from = twilio
                        .whatsapp_from
                        .as_deref()
                        .context("TWILIO_WHATSAPP_FROM not configured")?;
                    self.send_twilio(
                        twilio,
                        &format!("whatsapp:{}", message.to),
                        &format!("whatsapp:{from}"),
                        &message.body,
                    )
                    .await
                }
                None => {
                    log_only(message);
                    Ok(())
                }
            },
        }
    }
}

fn log_only(message: &Message) {
    tracing::info!(
        channel = message.channel.as_str(),
        to = %message.to,
        subject = %message.subject,
        body = %message.body,
        "notification provider not configured, logging message"
    );
}

impl NotificationSender for HttpNotificationSender {
    async fn send(&self, message: &Message) -> Result<(), StorefrontError> {
        self.dispatch(message).await.with_context(|| {
            format!("deliver {} message", message.channel.as_str())
        })?;
        Ok(())
    }
}
