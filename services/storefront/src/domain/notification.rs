//! Notification jobs: what gets enqueued, its delivery policy, and how it is
//! rendered into concrete messages for the dispatch worker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_domain::identifier::Identifier;

/// Outbound delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Email,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Sms,
}

impl DeliveryChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::WhatsApp => "whatsapp",
            Self::Sms => "sms",
        }
    }
}

/// Channel order for a recipient. The first channel is tried first, the
/// rest are single fallbacks in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub phone_prefers_whatsapp: bool,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            phone_prefers_whatsapp: true,
        }
    }
}

impl ChannelPolicy {
    pub fn channels_for(&self, recipient: &Identifier) -> &'static [DeliveryChannel] {
        match recipient {
            Identifier::Email(_) => &[DeliveryChannel::Email],
            Identifier::Phone(_) if self.phone_prefers_whatsapp => {
                &[DeliveryChannel::WhatsApp, DeliveryChannel::Sms]
            }
            Identifier::Phone(_) => &[DeliveryChannel::Sms],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationLine {
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Job payload. Stored as JSON in the outbox; the tag doubles as the row's `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    OtpDelivery {
        recipient: Identifier,
        /// Never written to the outbox. The dispatcher reads the live code from
        /// the ephemeral store when it delivers.
        #[serde(skip)]
        code: String,
        expires_in_secs: u64,
        channels: Vec<DeliveryChannel>,
    },
    Welcome {
        recipient: Identifier,
        name: String,
    },
    OrderConfirmation {
        recipient: Identifier,
        order_id: Uuid,
        customer_name: String,
        items: Vec<ConfirmationLine>,
        total_amount: Decimal,
        shipping_address: String,
    },
}

/// Queue options attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicy {
    /// Lower is claimed first.
    pub priority: i16,
    pub max_attempts: i32,
    /// Retry `n` waits `backoff_base_ms * 2^(n-1)`.
    pub backoff_base_ms: i64,
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OtpDelivery { .. } => "otp_delivery",
            Self::Welcome { .. } => "welcome",
            Self::OrderConfirmation { .. } => "order_confirmation",
        }
    }

    pub fn policy(&self) -> JobPolicy {
        match self {
            Self::OtpDelivery { .. } => JobPolicy {
                priority: 1,
                max_attempts: 3,
                backoff_base_ms: 2000,
            },
            Self::OrderConfirmation { .. } => JobPolicy {
                priority: 2,
                max_attempts: 3,
                backoff_base_ms: 2000,
            },
            Self::Welcome { .. } => JobPolicy {
                priority: 3,
                max_attempts: 2,
                backoff_base_ms: 3000,
            },
        }
    }

    pub fn recipient(&self) -> &Identifier {
        match self {
            Self::OtpDelivery { recipient, .. }
            | Self::Welcome { recipient, .. }
            | Self::OrderConfirmation { recipient, .. } => recipient,
        }
    }

    /// Render into the messages to attempt, in fallback order. Delivery stops at
    /// the first message that is accepted.
    pub fn render(&self, app_name: &str) -> Vec<Message> {
        let to = self.recipient().value().to_owned();
        match self {
            Self::OtpDelivery {
                code,
                expires_in_secs,
                channels,
                ..
            } => {
                let minutes = expires_in_secs.div_ceil(60);
                let body = format!(
                    "Your {app_name} verification code is {code}. It expires in {minutes} minutes. \
                     Do not share this code with anyone."
                );
                channels
                    .iter()
                    .map(|&channel| Message {
                        channel,
                        to: to.clone(),
                        subject: format!("Your OTP Code - {app_name}"),
                        body: body.clone(),
                    })
                    .collect()
            }
            Self::Welcome { name, recipient } => vec![Message {
                channel: default_channel(recipient),
                to,
                subject: format!("Welcome to {app_name}!"),
                body: format!(
                    "Hi {name},\n\nThank you for joining {app_name}. Your account is ready to use."
                ),
            }],
            Self::OrderConfirmation {
                recipient,
                order_id,
                customer_name,
                items,
                total_amount,
                shipping_address,
            } => {
                let mut body = format!(
                    "Hi {customer_name},\n\nThank you for your order #{order_id}.\n\n"
                );
                for item in items {
                    body.push_str(&format!(
                        "- {} x{} @ {}\n",
                        item.product_name, item.quantity, item.price
                    ));
                }
                body.push_str(&format!(
                    "\nTotal: {total_amount}\nShipping to: {shipping_address}\n\n{app_name}"
                ));
                vec![Message {
                    channel: default_channel(recipient),
                    to,
                    subject: format!("Order Confirmation - Order #{order_id}"),
                    body,
                }]
            }
        }
    }
}

fn default_channel(recipient: &Identifier) -> DeliveryChannel {
    match recipient {
        Identifier::Email(_) => DeliveryChannel::Email,
        Identifier::Phone(_) => DeliveryChannel::Sms,
    }
}

/// A job ready to enqueue.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub id: Uuid,
    /// Duplicate enqueues with the same key are dropped by the queue.
    pub idempotency_key: String,
    pub notification: Notification,
}

impl NotificationJob {
    pub fn new(notification: Notification) -> Self {
        let id = Uuid::now_v7();
        Self {
            id,
            idempotency_key: format!("{}:{id}", notification.kind()),
            notification,
        }
    }

    /// Job whose idempotency key is derived from a domain entity, so a retried
    /// enqueue for the same entity is a no-op.
    pub fn keyed(notification: Notification, entity_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            idempotency_key: format!("{}:{entity_id}", notification.kind()),
            notification,
        }
    }
}

/// A single rendered message for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: DeliveryChannel,
    pub to: String,
    /// Used by email only.
    pub subject: String,
    pub body: String,
}
