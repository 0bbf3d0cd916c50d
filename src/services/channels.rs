//! Delivery channels the notification dispatcher can be pointed at.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::state::records::{Notification, PlayerId};

/// Reasons a single delivery failed.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The recipient has no address usable by this channel.
    #[error("recipient {player_id} has no {channel} address")]
    MissingAddress {
        /// Channel that needed the address.
        channel: &'static str,
        /// Recipient lacking it.
        player_id: PlayerId,
    },
    /// The remote end answered with a non-success status.
    #[error("delivery rejected with status {status}")]
    Rejected {
        /// HTTP status code returned by the gateway.
        status: u16,
    },
    /// Network or protocol failure.
    #[error("transport failure: {message}")]
    Transport {
        /// Short description.
        message: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Delivery did not complete within the configured limit.
    #[error("delivery timed out")]
    Timeout,
}

/// Pluggable delivery mechanism for outbound notifications.
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    /// Deliver one notification.
    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), ChannelError>>;
}

/// Channel kinds selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Write notifications to the log, standing in for email.
    #[default]
    Log,
    /// Keep notifications in an in-memory inbox per player.
    Inbox,
    /// Forward notifications to a push gateway.
    Push,
}

/// Renders notifications as structured log lines addressed to the recipient's email.
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), ChannelError>> {
        if notification.recipient.email.trim().is_empty() {
            return Box::pin(future::ready(Err(ChannelError::MissingAddress {
                channel: "email",
                player_id: notification.recipient.player_id,
            })));
        }

        info!(
            to = %notification.recipient.email,
            title = %notification.title,
            body = %notification.body,
            "notification sent"
        );
        Box::pin(future::ready(Ok(())))
    }
}

/// In-memory inbox keyed by recipient.
#[derive(Debug, Clone, Default)]
pub struct InboxChannel {
    inboxes: Arc<DashMap<PlayerId, Vec<Notification>>>,
}

impl InboxChannel {
    /// Create an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification delivered to the player, oldest first.
    pub fn inbox(&self, player: PlayerId) -> Vec<Notification> {
        self.inboxes
            .get(&player)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Notifications the player has not read yet.
    pub fn unread(&self, player: PlayerId) -> Vec<Notification> {
        self.inbox(player)
            .into_iter()
            .filter(|notification| !notification.read)
            .collect()
    }

    /// Mark a notification as read. Returns whether it was found.
    pub fn mark_read(&self, player: PlayerId, notification: Uuid) -> bool {
        let Some(mut inbox) = self.inboxes.get_mut(&player) else {
            return false;
        };
        match inbox.iter_mut().find(|entry| entry.id == notification) {
            Some(entry) => {
                entry.mark_read();
                true
            }
            None => false,
        }
    }

    /// Total notifications held across all inboxes.
    pub fn len(&self) -> usize {
        self.inboxes.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether nothing was delivered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationChannel for InboxChannel {
    fn name(&self) -> &'static str {
        "inbox"
    }

    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), ChannelError>> {
        self.inboxes
            .entry(notification.recipient.player_id)
            .or_default()
            .push(notification);
        Box::pin(future::ready(Ok(())))
    }
}

#[cfg(feature = "push-channel")]
pub use push::PushChannel;

#[cfg(feature = "push-channel")]
mod push {
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use reqwest::Client;
    use serde::Serialize;

    use super::{ChannelError, NotificationChannel};
    use crate::state::records::Notification;

    /// Forwards notifications to an HTTP push gateway using the recipient's device token.
    #[derive(Clone)]
    pub struct PushChannel {
        client: Client,
        endpoint: Arc<str>,
    }

    #[derive(Serialize)]
    struct PushPayload<'a> {
        token: &'a str,
        title: &'a str,
        body: &'a str,
    }

    impl PushChannel {
        /// Build a channel posting to the given gateway URL.
        pub fn new(endpoint: impl Into<String>) -> Result<Self, ChannelError> {
            let client = Client::builder()
                .build()
                .map_err(|source| ChannelError::Transport {
                    message: "failed to build HTTP client".into(),
                    source: Box::new(source),
                })?;
            Ok(Self {
                client,
                endpoint: Arc::from(endpoint.into()),
            })
        }
    }

    impl NotificationChannel for PushChannel {
        fn name(&self) -> &'static str {
            "push"
        }

        fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), ChannelError>> {
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();

            Box::pin(async move {
                let Some(token) = notification.recipient.push_token.as_deref() else {
                    return Err(ChannelError::MissingAddress {
                        channel: "push",
                        player_id: notification.recipient.player_id,
                    });
                };

                let payload = PushPayload {
                    token,
                    title: &notification.title,
                    body: &notification.body,
                };

                let response = client
                    .post(endpoint.as_ref())
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|source| ChannelError::Transport {
                        message: format!("push gateway {endpoint} unreachable"),
                        source: Box::new(source),
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ChannelError::Rejected {
                        status: status.as_u16(),
                    });
                }
                Ok(())
            })
        }
    }
}
