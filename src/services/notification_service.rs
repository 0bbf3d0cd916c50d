//! Observer turning match phase changes into per-player notifications.
//!
//! The observer callback runs under the match lock and only builds messages and
//! enqueues them; a single worker task delivers jobs in FIFO order, so the order
//! in which transitions initiated dispatch is the order of delivery. Channel
//! failures are logged per recipient and never reach the transition caller.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, warn};

use crate::{
    services::channels::{ChannelError, NotificationChannel},
    state::{
        matches::Match,
        observer::MatchObserver,
        records::{Notification, Player, Recipient},
        state_machine::MatchPhase,
    },
};

/// Default upper bound for a single channel send.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

enum DeliveryJob {
    Deliver {
        channel: Arc<dyn NotificationChannel>,
        notifications: Vec<Notification>,
    },
    Flush(oneshot::Sender<()>),
}

/// Fixed message body announcing a phase.
pub fn phase_message(phase: MatchPhase) -> &'static str {
    match phase {
        MatchPhase::NeedsPlayers => "the match has been created",
        MatchPhase::RosterFull => "the roster is full, confirm your attendance",
        MatchPhase::Confirmed => "the match has been confirmed",
        MatchPhase::InProgress => "the match has started",
        MatchPhase::Finished => "the match has finished",
        MatchPhase::Cancelled => "the match has been cancelled",
    }
}

/// Build one notification per roster member for the match's current phase.
pub fn phase_notifications(fixture: &Match) -> Vec<Notification> {
    let phase = fixture.phase();
    let title = format!("{}: {}", fixture.title(), phase.label());
    let body = phase_message(phase);

    fixture
        .roster()
        .map(|member| Notification::new(title.clone(), body, Recipient::from(member)))
        .collect()
}

/// Build invitation notifications for the given candidates.
pub fn invitation_notifications(fixture: &Match, candidates: &[Player]) -> Vec<Notification> {
    let title = format!("Invitation: {}", fixture.title());
    let body = format!(
        "you are invited to play {} on {}",
        fixture.sport().name,
        fixture
            .scheduled_at()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| fixture.scheduled_at().to_string())
    );

    candidates
        .iter()
        .map(|candidate| Notification::new(title.clone(), body.clone(), Recipient::from(candidate)))
        .collect()
}

/// Match observer forwarding notifications to the configured channel.
pub struct NotificationDispatcher {
    channel: RwLock<Arc<dyn NotificationChannel>>,
    queue: mpsc::UnboundedSender<DeliveryJob>,
}

impl NotificationDispatcher {
    /// Create the dispatcher and spawn its delivery worker on the current Tokio runtime.
    pub fn spawn(
        channel: Arc<dyn NotificationChannel>,
        delivery_timeout: Option<Duration>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (queue, jobs) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(jobs, delivery_timeout));
        let dispatcher = Arc::new(Self {
            channel: RwLock::new(channel),
            queue,
        });
        (dispatcher, worker)
    }

    /// Swap the delivery channel; the next dispatch uses it.
    pub fn set_channel(&self, channel: Arc<dyn NotificationChannel>) {
        let mut guard = self.channel.write().unwrap_or_else(PoisonError::into_inner);
        debug!(from = guard.name(), to = channel.name(), "notification channel swapped");
        *guard = channel;
    }

    /// Name of the channel currently in use.
    pub fn channel_name(&self) -> &'static str {
        self.current_channel().name()
    }

    /// Queue notifications for delivery through the current channel.
    pub fn dispatch(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }

        let job = DeliveryJob::Deliver {
            channel: self.current_channel(),
            notifications,
        };
        if self.queue.send(job).is_err() {
            warn!("notification worker stopped; dropping notifications");
        }
    }

    /// Wait until everything queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(DeliveryJob::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    fn current_channel(&self) -> Arc<dyn NotificationChannel> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MatchObserver for NotificationDispatcher {
    fn on_match_changed(&self, fixture: &Match) {
        debug!(
            match_id = %fixture.id(),
            phase = %fixture.phase(),
            recipients = fixture.roster_len(),
            "dispatching phase notifications"
        );
        self.dispatch(phase_notifications(fixture));
    }
}

async fn run_worker(
    mut jobs: mpsc::UnboundedReceiver<DeliveryJob>,
    delivery_timeout: Option<Duration>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            DeliveryJob::Deliver {
                channel,
                notifications,
            } => {
                for notification in notifications {
                    let recipient = notification.recipient.player_id;
                    let notification_id = notification.id;
                    if let Err(err) = deliver(channel.as_ref(), notification, delivery_timeout).await
                    {
                        warn!(
                            channel = channel.name(),
                            %recipient,
                            %notification_id,
                            error = %err,
                            "notification delivery failed"
                        );
                    }
                }
            }
            DeliveryJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn deliver(
    channel: &dyn NotificationChannel,
    notification: Notification,
    delivery_timeout: Option<Duration>,
) -> Result<(), ChannelError> {
    let send = channel.send(notification);
    match delivery_timeout {
        Some(limit) => timeout(limit, send)
            .await
            .map_err(|_| ChannelError::Timeout)?,
        None => send.await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::{self, BoxFuture};

    use super::*;
    use crate::{
        services::channels::InboxChannel,
        state::matches::tests::{draft, player},
    };

    /// Fails for one recipient, records everybody else.
    struct FlakyChannel {
        failing: uuid::Uuid,
        delivered: Mutex<Vec<Notification>>,
    }

    impl NotificationChannel for FlakyChannel {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), ChannelError>> {
            if notification.recipient.player_id == self.failing {
                return Box::pin(future::ready(Err(ChannelError::Rejected { status: 503 })));
            }
            self.delivered.lock().unwrap().push(notification);
            Box::pin(future::ready(Ok(())))
        }
    }

    struct StalledChannel;

    impl NotificationChannel for StalledChannel {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn send(&self, _notification: Notification) -> BoxFuture<'static, Result<(), ChannelError>> {
            Box::pin(future::pending())
        }
    }

    #[test]
    fn phase_notifications_cover_the_roster() {
        let mut fixture = Match::new(draft(2, 2, 4), player("Ana")).unwrap();
        fixture.add_player(player("Bruno")).unwrap();

        let notifications = phase_notifications(&fixture);
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(|n| n.title == "Thursday futsal: roster full"));
        assert!(
            notifications
                .iter()
                .all(|n| n.body == "the roster is full, confirm your attendance")
        );
        assert!(notifications.iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn transitions_reach_every_member() {
        let inbox = InboxChannel::new();
        let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::new(inbox.clone()), None);

        let organizer = player("Ana");
        let guest = player("Bruno");
        let mut fixture = Match::new(draft(2, 2, 4), organizer.clone()).unwrap();
        fixture.attach(dispatcher.clone());
        fixture.add_player(guest.clone()).unwrap();
        fixture.cancel().unwrap();

        dispatcher.flush().await;
        let bodies: Vec<_> = inbox
            .inbox(guest.id)
            .into_iter()
            .map(|n| n.body)
            .collect();
        assert_eq!(
            bodies,
            vec![
                "the roster is full, confirm your attendance".to_string(),
                "the match has been cancelled".to_string()
            ]
        );
        assert_eq!(inbox.inbox(organizer.id).len(), 2);
    }

    #[tokio::test]
    async fn failing_recipient_does_not_stop_the_others() {
        let organizer = player("Ana");
        let guest = player("Bruno");
        let channel = Arc::new(FlakyChannel {
            failing: organizer.id,
            delivered: Mutex::new(Vec::new()),
        });
        let (dispatcher, _worker) = NotificationDispatcher::spawn(channel.clone(), None);

        let mut fixture = Match::new(draft(2, 2, 4), organizer).unwrap();
        fixture.attach(dispatcher.clone());
        fixture.add_player(guest.clone()).unwrap();
        assert_eq!(fixture.phase(), MatchPhase::RosterFull);

        dispatcher.flush().await;
        let delivered = channel.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient.player_id, guest.id);
    }

    #[tokio::test]
    async fn swapped_channel_applies_to_next_dispatch() {
        let first = InboxChannel::new();
        let second = InboxChannel::new();
        let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::new(first.clone()), None);

        let mut fixture = Match::new(draft(2, 2, 4), player("Ana")).unwrap();
        fixture.attach(dispatcher.clone());
        fixture.add_player(player("Bruno")).unwrap();

        dispatcher.set_channel(Arc::new(second.clone()));
        assert_eq!(dispatcher.channel_name(), "inbox");
        fixture.cancel().unwrap();

        dispatcher.flush().await;
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn stalled_channel_times_out() {
        let (dispatcher, _worker) = NotificationDispatcher::spawn(
            Arc::new(StalledChannel),
            Some(Duration::from_millis(10)),
        );

        let mut fixture = Match::new(draft(2, 2, 4), player("Ana")).unwrap();
        fixture.attach(dispatcher.clone());
        fixture.add_player(player("Bruno")).unwrap();

        // returns only because each send gives up after the timeout
        dispatcher.flush().await;
    }
}
