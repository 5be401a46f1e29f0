// Outbound message dispatch
//
// The engine hands each rendered message to a `MessageDispatcher`. Concrete
// SMS/email/WhatsApp providers sit behind a notification gateway reached over
// HTTP; without one configured, messages are only logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::automations::{
    error::DispatchError,
    models::{ActionType, ContactChannel},
};

/// One personalized message for one recipient
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMessage {
    pub provider_id: Uuid,
    pub action: ActionType,
    pub contact_channel: ContactChannel,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReceipt {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError>;
}

/// Gateway response body
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    success: bool,
    message_id: Option<String>,
    error: Option<String>,
}

/// Posts messages as JSON to a notification gateway
pub struct HttpDispatcher {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDispatcher {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(DispatchError::Transport(
                "notification endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl MessageDispatcher for HttpDispatcher {
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                endpoint = %self.endpoint,
                status = %status,
                "Notification gateway rejected {} message",
                message.action
            );
            return Err(DispatchError::Rejected(format!(
                "HTTP {} - {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: GatewayResponse = response.json().await?;
        if !body.success {
            return Err(DispatchError::Rejected(
                body.error
                    .unwrap_or_else(|| "gateway reported failure".to_string()),
            ));
        }

        debug!(
            endpoint = %self.endpoint,
            message_id = ?body.message_id,
            "{} message accepted",
            message.action
        );

        Ok(DispatchReceipt {
            message_id: body.message_id,
        })
    }
}

/// Logs messages instead of sending them; used when no gateway is configured
#[derive(Debug, Default)]
pub struct LogDispatcher {
    sequence: AtomicU64,
}

impl LogDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageDispatcher for LogDispatcher {
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            provider_id = %message.provider_id,
            destination = %message.destination,
            "[{}] {}",
            message.action,
            message.body
        );

        Ok(DispatchReceipt {
            message_id: Some(format!("log-{}", n)),
        })
    }
}
