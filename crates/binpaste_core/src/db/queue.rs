//! Durable FIFO for view-tracking events backed by redb.
//!
//! Events survive process restarts until they are acknowledged. Reading the
//! head leaves it in place; the paste write that applies an event removes it
//! in the same transaction (see [`crate::db::store::PasteStore::conditional_save_acking`]),
//! so a crash at any point either keeps the event pending or has counted it.

use crate::{
    db::tables::*,
    error::AppError,
    models::tracking::{TrackingDelivery, TrackingEvent},
    tracking::TrackingChannel,
};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use std::sync::Arc;

/// Accessor for the tracking queue tables.
pub struct TrackingQueueDb {
    db: Arc<redb::Database>,
}

impl TrackingQueueDb {
    /// Initialize queue tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TRACKING_QUEUE)?;
        write_txn.open_table(TRACKING_STATE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }
}

fn append(write_txn: &redb::WriteTransaction, event: &TrackingEvent) -> Result<u64, AppError> {
    let encoded = bincode::serialize(event)?;
    let mut state = write_txn.open_table(TRACKING_STATE)?;
    let seq = state
        .get(TRACKING_NEXT_SEQ_KEY)?
        .map(|guard| guard.value())
        .unwrap_or(0);
    state.insert(TRACKING_NEXT_SEQ_KEY, seq + 1)?;

    let mut queue = write_txn.open_table(TRACKING_QUEUE)?;
    queue.insert(seq, encoded.as_slice())?;
    Ok(seq)
}

impl TrackingChannel for TrackingQueueDb {
    fn publish(&self, event: &TrackingEvent) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        append(&write_txn, event)?;
        write_txn.commit()?;
        Ok(())
    }

    fn peek_next(&self) -> Result<Option<TrackingDelivery>, AppError> {
        let read_txn = self.db.begin_read()?;
        let queue = read_txn.open_table(TRACKING_QUEUE)?;
        let result = match queue.first()? {
            Some((seq, value)) => Ok(Some(TrackingDelivery {
                seq: seq.value(),
                event: bincode::deserialize(value.value())?,
            })),
            None => Ok(None),
        };
        result
    }

    fn ack(&self, seq: u64) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut queue = write_txn.open_table(TRACKING_QUEUE)?;
            let _ = queue.remove(seq)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn requeue(&self, delivery: &TrackingDelivery) -> Result<(), AppError> {
        let mut event = delivery.event.clone();
        event.deliveries = event.deliveries.saturating_add(1);

        let write_txn = self.db.begin_write()?;
        {
            let mut queue = write_txn.open_table(TRACKING_QUEUE)?;
            if queue.remove(delivery.seq)?.is_none() {
                // Already acknowledged elsewhere; nothing to redeliver.
                return Ok(());
            }
        }
        append(&write_txn, &event)?;
        write_txn.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<usize, AppError> {
        let read_txn = self.db.begin_read()?;
        let queue = read_txn.open_table(TRACKING_QUEUE)?;
        Ok(queue.len()? as usize)
    }
}
