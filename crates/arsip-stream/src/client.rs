//! The notification client: one long-lived connection task per client.
//!
//! The task owns the event source and the heartbeat timer. Everything the
//! outside world can see (state, attempt counter, ready state, last error)
//! lives in `Shared`, guarded so that a task that has been replaced or
//! closed can no longer change it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arsip_protocol::{Channel, ConnectionStatus, ErrorNotice, Notification, SseEvent};
use arsip_session::{OnRejected, RefreshCoordinator, RefreshOutcome};
use arsip_transport::{EventSource, ReadyState, ReadyStateCell, Transport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{StreamConfig, StreamError, StreamState, SubscriberRegistry, Subscription};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Which connection task, if any, is allowed to act for the client.
struct Control {
    /// Bumped by every `connect` and `close`. A task only acts while its
    /// own generation is current.
    generation: u64,
    task: Option<JoinHandle<()>>,
    ready: Option<ReadyStateCell>,
}

struct Shared<T: Transport> {
    coordinator: Arc<RefreshCoordinator<T>>,
    config: StreamConfig,
    registry: Arc<SubscriberRegistry>,
    state: watch::Sender<StreamState>,
    control: Mutex<Control>,
    should_reconnect: AtomicBool,
    attempt: AtomicU32,
    last_error: Mutex<Option<StreamError>>,
}

impl<T: Transport> Shared<T> {
    fn publish(&self, notification: &Notification) {
        self.registry.dispatch(notification);
    }
}

/// Real-time notifications over a server-push stream, with heartbeat
/// detection, bounded reconnects, and token refresh on reconnect.
///
/// Dropping the client stops its connection task.
///
/// # Example
///
/// ```ignore
/// let client = NotificationClient::new(coordinator, StreamConfig::default());
/// let sub = client.subscribe(Channel::Sidebar, |n| println!("{}", n.payload));
/// client.connect();
/// // ...
/// sub.unsubscribe();
/// client.close();
/// ```
pub struct NotificationClient<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> NotificationClient<T> {
    pub fn new(coordinator: Arc<RefreshCoordinator<T>>, config: StreamConfig) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        Self {
            shared: Arc::new(Shared {
                coordinator,
                config: config.validated(),
                registry: Arc::new(SubscriberRegistry::new()),
                state,
                control: Mutex::new(Control {
                    generation: 0,
                    task: None,
                    ready: None,
                }),
                should_reconnect: AtomicBool::new(false),
                attempt: AtomicU32::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Subscribers
    // -----------------------------------------------------------------------

    /// Registers `callback` for `channel`. Callbacks run on the connection
    /// task, in subscription order; keep them short.
    pub fn subscribe(
        &self,
        channel: impl Into<Channel>,
        callback: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        let channel = channel.into();
        let id = self
            .shared
            .registry
            .subscribe(channel.clone(), Arc::new(callback));
        Subscription::new(&self.shared.registry, channel, id)
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.shared.registry
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens the stream in a background task.
    ///
    /// Does nothing while a connection task is already connecting, open,
    /// or waiting to reconnect. Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut control = lock(&self.shared.control);
        let task_alive = control.task.as_ref().is_some_and(|t| !t.is_finished());
        if task_alive && self.shared.state.borrow().is_active() {
            tracing::debug!("notification stream already active");
            return;
        }

        self.shared.should_reconnect.store(true, Ordering::Release);
        *lock(&self.shared.last_error) = None;
        control.generation += 1;
        control.ready = None;
        if let Some(stale) = control.task.take() {
            stale.abort();
        }
        self.shared.state.send_replace(StreamState::Connecting);

        let connection = Connection {
            shared: Arc::clone(&self.shared),
            generation: control.generation,
        };
        control.task = Some(tokio::spawn(connection.run()));
        tracing::info!("notification stream connecting");
    }

    /// Closes the stream and stops reconnecting.
    ///
    /// Cancels whatever the connection task is waiting on (open, read,
    /// backoff) and publishes `disconnected`.
    pub fn close(&self) {
        self.shared.should_reconnect.store(false, Ordering::Release);
        let task = {
            let mut control = lock(&self.shared.control);
            control.generation += 1;
            control.ready = None;
            self.shared.state.send_replace(StreamState::Closed);
            control.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        tracing::info!("notification stream closed");
        self.shared
            .publish(&ConnectionStatus::Disconnected.into_notification());
    }

    /// Closes, waits briefly, and connects again with a fresh attempt
    /// budget.
    pub async fn reconnect(&self) {
        tracing::info!("manual notification stream reconnect");
        self.close();
        self.shared.attempt.store(0, Ordering::Release);
        tokio::time::sleep(self.shared.config.manual_reconnect_delay).await;
        self.connect();
    }

    // -----------------------------------------------------------------------
    // Observability
    // -----------------------------------------------------------------------

    pub fn state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    /// A receiver that sees every state change.
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    /// The transport's own view of the live connection. `Closed` when no
    /// connection is open.
    pub fn ready_state(&self) -> ReadyState {
        let control = lock(&self.shared.control);
        match (self.state(), &control.ready) {
            (StreamState::Open, Some(cell)) => cell.get(),
            (StreamState::Connecting | StreamState::Reconnecting { .. }, _) => {
                ReadyState::Connecting
            }
            _ => ReadyState::Closed,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.attempt.load(Ordering::Acquire)
    }

    /// Why the client entered [`StreamState::Failed`], if it has.
    pub fn last_error(&self) -> Option<StreamError> {
        lock(&self.shared.last_error).clone()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }
}

impl<T: Transport> Drop for NotificationClient<T> {
    fn drop(&mut self) {
        let mut control = lock(&self.shared.control);
        control.generation += 1;
        if let Some(task) = control.task.take() {
            task.abort();
        }
    }
}

impl<T: Transport> std::fmt::Debug for NotificationClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationClient")
            .field("state", &self.state())
            .field("reconnect_attempt", &self.reconnect_attempt())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

enum Next {
    Reconnect,
    Stop,
}

struct Connection<T: Transport> {
    shared: Arc<Shared<T>>,
    generation: u64,
}

impl<T: Transport> Connection<T> {
    fn is_current(&self) -> bool {
        lock(&self.shared.control).generation == self.generation
    }

    /// Changes the client state if this task still owns the client.
    fn transition(&self, state: StreamState) -> bool {
        let control = lock(&self.shared.control);
        if control.generation != self.generation {
            return false;
        }
        self.shared.state.send_replace(state);
        true
    }

    fn publish(&self, notification: Notification) {
        if self.is_current() {
            self.shared.publish(&notification);
        }
    }

    async fn run(self) {
        loop {
            match self.shared.coordinator.transport().open_events().await {
                Ok(mut events) => {
                    let ready = events.ready_state();
                    {
                        let mut control = lock(&self.shared.control);
                        if control.generation != self.generation {
                            return;
                        }
                        control.ready = Some(ready.clone());
                        self.shared.attempt.store(0, Ordering::Release);
                        self.shared.state.send_replace(StreamState::Open);
                    }
                    tracing::info!("notification stream open");
                    self.publish(ConnectionStatus::Connected.into_notification());

                    let reason = self.pump(&mut events, &ready).await;
                    drop(events);
                    tracing::warn!(%reason, "notification stream lost");
                    self.publish(ErrorNotice { message: reason }.into_notification());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "notification stream failed to open");
                    self.publish(
                        ErrorNotice {
                            message: e.to_string(),
                        }
                        .into_notification(),
                    );
                }
            }

            match self.after_disconnect().await {
                Next::Reconnect => {
                    if !self.transition(StreamState::Connecting) {
                        return;
                    }
                }
                Next::Stop => return,
            }
        }
    }

    /// Reads events until the connection ends. Returns why it ended.
    async fn pump(&self, events: &mut T::Events, ready: &ReadyStateCell) -> String {
        let period = self.shared.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.next_event() => match event {
                    Ok(Some(event)) => self.deliver(&event),
                    Ok(None) => return "notification stream ended".to_string(),
                    Err(e) => return e.to_string(),
                },
                _ = heartbeat.tick() => {
                    if ready.get() == ReadyState::Closed {
                        tracing::warn!("heartbeat found connection closed");
                        return "connection lost".to_string();
                    }
                    tracing::trace!("heartbeat ok");
                }
            }
        }
    }

    fn deliver(&self, event: &SseEvent) {
        match Notification::from_sse(event) {
            Ok(notification) => {
                tracing::trace!(channel = %notification.channel, "notification received");
                self.publish(notification);
            }
            Err(e) => {
                tracing::warn!(error = %e, data = %event.data, "dropping malformed notification");
            }
        }
    }

    /// Decides what happens after a connection attempt ends.
    async fn after_disconnect(&self) -> Next {
        let shared = &self.shared;
        if !shared.should_reconnect.load(Ordering::Acquire) || !self.is_current() {
            return Next::Stop;
        }

        let attempt = shared.attempt.load(Ordering::Acquire);
        let max = shared.config.max_reconnect_attempts;
        if attempt >= max {
            tracing::error!(attempts = attempt, "notification stream reconnect attempts exhausted");
            self.fail(StreamError::ReconnectExhausted { attempts: attempt });
            self.publish(ConnectionStatus::Failed.into_notification());
            return Next::Stop;
        }

        let attempt = attempt + 1;
        shared.attempt.store(attempt, Ordering::Release);
        if !self.transition(StreamState::Reconnecting { attempt }) {
            return Next::Stop;
        }
        tracing::info!(attempt, max, "notification stream reconnecting");
        self.publish(ConnectionStatus::Reconnecting { attempt }.into_notification());

        match shared.coordinator.refresh(OnRejected::Defer).await {
            RefreshOutcome::Refreshed => {
                tokio::time::sleep(shared.config.reconnect_delay).await;
            }
            RefreshOutcome::Rejected { status } => {
                tracing::warn!(status, "token refresh rejected, stopping notification stream");
                shared.should_reconnect.store(false, Ordering::Release);
                self.fail(StreamError::AuthenticationFailed);
                self.publish(ConnectionStatus::AuthenticationFailed.into_notification());
                tokio::time::sleep(shared.config.auth_redirect_delay).await;
                // A no-op if another caller already ended this session.
                if self.is_current() {
                    shared.coordinator.redirect().redirect();
                }
                return Next::Stop;
            }
            RefreshOutcome::Unreachable { reason } => {
                let backoff = shared.config.unreachable_backoff(attempt);
                tracing::warn!(
                    %reason,
                    backoff_ms = backoff.as_millis() as u64,
                    "token refresh unreachable, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        if shared.should_reconnect.load(Ordering::Acquire) {
            Next::Reconnect
        } else {
            Next::Stop
        }
    }

    fn fail(&self, error: StreamError) {
        if self.transition(StreamState::Failed) {
            *lock(&self.shared.last_error) = Some(error);
        }
    }
}
