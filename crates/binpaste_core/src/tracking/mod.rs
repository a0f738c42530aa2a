//! View-count pipeline decoupled from the read path.
//!
//! Reads publish a [`TrackingEvent`] to a durable channel and return at once.
//! A single worker thread drains the channel in order and applies each event
//! through [`crate::mutation::mutate_and_ack`], so counting a view and
//! acknowledging its event commit together.

use crate::config::Config;
use crate::constants::{DEFAULT_TRACKING_MAX_REDELIVERIES, DEFAULT_TRACKING_POLL_INTERVAL_MS};
use crate::db::store::PasteStore;
use crate::error::AppError;
use crate::models::tracking::{TrackingDelivery, TrackingEvent};
use crate::mutation::{mutate_and_ack, RetryPolicy};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Durable, single-consumer event channel.
///
/// Delivery does not acknowledge: the head stays pending until it is applied
/// by [`PasteStore::conditional_save_acking`], dropped through
/// [`TrackingChannel::ack`], or moved by [`TrackingChannel::requeue`].
pub trait TrackingChannel: Send + Sync {
    /// Append `event` to the tail of the channel.
    fn publish(&self, event: &TrackingEvent) -> Result<(), AppError>;

    /// Return the oldest pending event without removing it.
    fn peek_next(&self) -> Result<Option<TrackingDelivery>, AppError>;

    /// Remove delivery `seq` without applying it.
    fn ack(&self, seq: u64) -> Result<(), AppError>;

    /// Atomically move `delivery` to the tail with its delivery count bumped.
    ///
    /// A requeued event lands behind events published after it, so events for
    /// one paste may be applied out of publish order. Counts are unaffected and
    /// `last_viewed` only moves forward, so the final state is the same.
    fn requeue(&self, delivery: &TrackingDelivery) -> Result<(), AppError>;

    /// Number of pending events.
    fn len(&self) -> Result<usize, AppError>;
}

enum WorkerSignal {
    Wake,
    Shutdown,
}

/// Read-path handle for recording views.
#[derive(Clone)]
pub struct TrackingSender {
    channel: Arc<dyn TrackingChannel>,
    wake: Option<Sender<WorkerSignal>>,
}

impl TrackingSender {
    /// Sender that only publishes; a worker started elsewhere polls the channel.
    pub fn new(channel: Arc<dyn TrackingChannel>) -> Self {
        Self {
            channel,
            wake: None,
        }
    }

    /// Record one view of `paste_id` observed at `viewed_at`.
    ///
    /// Never blocks on the consumer and never fails the caller: when the
    /// channel rejects the event it is logged and dropped.
    ///
    /// # Returns
    /// `true` when the event was accepted by the channel.
    pub fn track_view(&self, paste_id: &str, viewed_at: DateTime<Utc>) -> bool {
        let event = TrackingEvent::new(paste_id, viewed_at);
        if let Err(err) = self.channel.publish(&event) {
            warn!(paste_id, error = %err, "Tracking channel unavailable; view dropped");
            return false;
        }
        if let Some(wake) = &self.wake {
            // A full signal slot already guarantees a pending wake-up.
            let _ = wake.try_send(WorkerSignal::Wake);
        }
        true
    }
}

/// Tuning for [`TrackingWorker`].
#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Idle wait between channel polls when nothing signals new events.
    pub poll_interval: Duration,
    /// Redeliveries allowed for an event that keeps failing transiently.
    pub max_redeliveries: u32,
    /// Budget for each application attempt.
    pub retry: RetryPolicy,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_TRACKING_POLL_INTERVAL_MS),
            max_redeliveries: DEFAULT_TRACKING_MAX_REDELIVERIES,
            retry: RetryPolicy::background(),
        }
    }
}

impl TrackingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.tracking_poll_interval(),
            max_redeliveries: config.tracking_max_redeliveries,
            retry: RetryPolicy::background(),
        }
    }
}

/// What happened to one delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Counted and acknowledged in one write.
    Applied,
    /// Moved to the tail for a later attempt.
    Requeued,
    /// Acknowledged without counting.
    Dropped,
    /// Left at the head because the channel could not be updated.
    Retained,
}

/// Apply one delivered event to the store.
///
/// Events for unknown, non-public, expired, or soft-deleted pastes are
/// dropped at once. Conflicts and transient failures are requeued until
/// `max_redeliveries` is reached, then dropped. When the channel itself
/// fails the event stays pending.
pub fn process_event(
    store: &dyn PasteStore,
    channel: &dyn TrackingChannel,
    delivery: &TrackingDelivery,
    settings: &TrackingSettings,
) -> Disposition {
    let event = &delivery.event;
    let applied = mutate_and_ack(
        store,
        &event.paste_id,
        &settings.retry,
        delivery.seq,
        |paste| {
            if !paste.is_public() || !paste.is_legitimate(Utc::now()) {
                return Err(AppError::NotFound);
            }
            paste.track_view(event.viewed_at);
            Ok(())
        },
    );

    match applied {
        Ok((paste, ())) => {
            debug!(paste_id = %event.paste_id, views = paste.views, "View tracked");
            Disposition::Applied
        }
        Err(AppError::NotFound) => {
            warn!(
                paste_id = %event.paste_id,
                "Dropping tracking event for unknown or retired paste"
            );
            drop_delivery(channel, delivery)
        }
        Err(err) if err.is_transient() || matches!(err, AppError::Conflict { .. }) => {
            if event.deliveries >= settings.max_redeliveries {
                warn!(
                    paste_id = %event.paste_id,
                    deliveries = event.deliveries,
                    error = %err,
                    "Dropping tracking event after exhausting redeliveries"
                );
                return drop_delivery(channel, delivery);
            }
            match channel.requeue(delivery) {
                Ok(()) => {
                    warn!(
                        paste_id = %event.paste_id,
                        deliveries = event.deliveries + 1,
                        error = %err,
                        "Re-queued tracking event"
                    );
                    Disposition::Requeued
                }
                Err(requeue_err) => {
                    error!(
                        paste_id = %event.paste_id,
                        error = %requeue_err,
                        "Failed to re-queue tracking event; leaving it pending"
                    );
                    Disposition::Retained
                }
            }
        }
        Err(err) => {
            error!(paste_id = %event.paste_id, error = %err, "Dropping tracking event");
            drop_delivery(channel, delivery)
        }
    }
}

fn drop_delivery(channel: &dyn TrackingChannel, delivery: &TrackingDelivery) -> Disposition {
    match channel.ack(delivery.seq) {
        Ok(()) => Disposition::Dropped,
        Err(err) => {
            error!(
                paste_id = %delivery.event.paste_id,
                error = %err,
                "Failed to acknowledge dropped tracking event; leaving it pending"
            );
            Disposition::Retained
        }
    }
}

/// Handle for the dedicated tracking consumer thread.
pub struct TrackingWorker {
    signal_tx: Sender<WorkerSignal>,
    handle: Option<JoinHandle<()>>,
}

impl TrackingWorker {
    /// Spawn the consumer thread and return it with a waking sender.
    ///
    /// # Returns
    /// The worker handle and a [`TrackingSender`] that wakes it on publish.
    ///
    /// # Errors
    /// Returns [`AppError::Messaging`] if the thread cannot be spawned.
    pub fn spawn(
        store: Arc<dyn PasteStore>,
        channel: Arc<dyn TrackingChannel>,
        settings: TrackingSettings,
    ) -> Result<(Self, TrackingSender), AppError> {
        let (signal_tx, signal_rx) = bounded(1);
        let worker_channel = channel.clone();
        let handle = thread::Builder::new()
            .name("binpaste-tracking".to_string())
            .spawn(move || run(store.as_ref(), worker_channel.as_ref(), &settings, &signal_rx))
            .map_err(|err| {
                AppError::Messaging(format!("Failed to spawn tracking worker: {}", err))
            })?;

        let sender = TrackingSender {
            channel,
            wake: Some(signal_tx.clone()),
        };
        Ok((
            Self {
                signal_tx,
                handle: Some(handle),
            },
            sender,
        ))
    }

    /// Stop the worker after the event in flight and wait for the thread.
    ///
    /// Pending events stay in the channel for the next start.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.signal_tx.send(WorkerSignal::Shutdown);
        if handle.join().is_err() {
            error!("Tracking worker thread panicked");
        }
    }
}

impl Drop for TrackingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    store: &dyn PasteStore,
    channel: &dyn TrackingChannel,
    settings: &TrackingSettings,
    signal_rx: &Receiver<WorkerSignal>,
) {
    match channel.len() {
        Ok(pending) => info!(pending, "Tracking worker started"),
        Err(err) => warn!(error = %err, "Tracking worker started; pending count unavailable"),
    }
    loop {
        if !drain(store, channel, settings, signal_rx) {
            break;
        }
        match signal_rx.recv_timeout(settings.poll_interval) {
            Ok(WorkerSignal::Wake) | Err(RecvTimeoutError::Timeout) => {}
            Ok(WorkerSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("Tracking worker stopped");
}

/// Process pending events until the channel is empty, an event is requeued
/// or retained, or shutdown is requested.
///
/// # Returns
/// `false` when the worker should stop.
fn drain(
    store: &dyn PasteStore,
    channel: &dyn TrackingChannel,
    settings: &TrackingSettings,
    signal_rx: &Receiver<WorkerSignal>,
) -> bool {
    loop {
        match signal_rx.try_recv() {
            Ok(WorkerSignal::Shutdown) | Err(TryRecvError::Disconnected) => return false,
            Ok(WorkerSignal::Wake) | Err(TryRecvError::Empty) => {}
        }

        let delivery = match channel.peek_next() {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return true,
            Err(err) => {
                warn!(error = %err, "Tracking channel unavailable; retrying after poll interval");
                return true;
            }
        };

        match process_event(store, channel, &delivery, settings) {
            Disposition::Applied | Disposition::Dropped => {}
            // Give the store or channel a poll interval to recover.
            Disposition::Requeued | Disposition::Retained => return true,
        }
    }
}
