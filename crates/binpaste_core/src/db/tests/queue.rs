//! Tracking queue tests.

use super::*;
use crate::models::tracking::TrackingDelivery;

fn ack_head(db: &Database) -> TrackingDelivery {
    let delivery = db.tracking.peek_next().expect("peek").expect("delivery");
    db.tracking.ack(delivery.seq).expect("ack");
    delivery
}

#[test]
fn queue_is_fifo_and_peek_does_not_acknowledge() {
    let (db, _temp) = setup_test_db();
    let now = Utc::now();

    for idx in 0..3 {
        db.tracking
            .publish(&TrackingEvent::new(format!("paste-{}", idx), now))
            .expect("publish");
    }
    assert_eq!(db.tracking.len().unwrap(), 3);

    let head = db.tracking.peek_next().unwrap().expect("head");
    assert_eq!(db.tracking.peek_next().unwrap(), Some(head.clone()));
    assert_eq!(db.tracking.len().unwrap(), 3);

    for idx in 0..3 {
        let delivery = ack_head(&db);
        assert_eq!(delivery.event.paste_id, format!("paste-{}", idx));
    }
    assert!(db.tracking.peek_next().expect("peek").is_none());
    assert_eq!(db.tracking.len().unwrap(), 0);
}

#[test]
fn queue_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db");
    let path = db_path.to_str().unwrap();
    let viewed_at = Utc::now();

    {
        let db = Database::new(path).expect("open");
        db.tracking
            .publish(&TrackingEvent::new("abc", viewed_at))
            .expect("publish");
        db.tracking.peek_next().expect("peek before close");
    }

    let db = Database::new(path).expect("reopen");
    let delivery = db.tracking.peek_next().expect("peek").expect("event");
    assert_eq!(delivery.event, TrackingEvent::new("abc", viewed_at));
}

#[test]
fn sequence_keeps_growing_after_drain() {
    let (db, _temp) = setup_test_db();
    let now = Utc::now();

    db.tracking.publish(&TrackingEvent::new("first", now)).unwrap();
    let first = ack_head(&db);
    db.tracking.publish(&TrackingEvent::new("second", now)).unwrap();
    db.tracking.publish(&TrackingEvent::new("third", now)).unwrap();

    let second = ack_head(&db);
    assert_eq!(second.event.paste_id, "second");
    assert!(second.seq > first.seq);
    assert_eq!(ack_head(&db).event.paste_id, "third");
}

#[test]
fn requeue_moves_head_to_tail_in_one_step() {
    let (db, _temp) = setup_test_db();
    let now = Utc::now();
    db.tracking.publish(&TrackingEvent::new("first", now)).unwrap();
    db.tracking.publish(&TrackingEvent::new("second", now)).unwrap();

    let head = db.tracking.peek_next().unwrap().expect("head");
    db.tracking.requeue(&head).expect("requeue");
    assert_eq!(db.tracking.len().unwrap(), 2);

    assert_eq!(ack_head(&db).event.paste_id, "second");
    let moved = ack_head(&db);
    assert_eq!(moved.event.paste_id, "first");
    assert_eq!(moved.event.deliveries, 1);
    assert!(moved.seq > head.seq);

    db.tracking.requeue(&head).expect("requeue of acknowledged delivery");
    assert_eq!(db.tracking.len().unwrap(), 0, "acknowledged deliveries stay gone");
}

#[test]
fn acking_save_removes_delivery_with_the_row_write() {
    let (db, _temp) = setup_test_db();
    let paste = insert_paste(&db, "Lorem ipsum", Exposure::Public);
    db.tracking
        .publish(&TrackingEvent::new(paste.id.clone(), Utc::now()))
        .unwrap();
    let delivery = db.tracking.peek_next().unwrap().expect("delivery");

    let mut viewed = paste.clone();
    viewed.views = 1;
    let stale = db
        .pastes
        .conditional_save_acking(&viewed, 7, delivery.seq)
        .expect("stale save");
    assert_eq!(stale, SaveOutcome::VersionConflict { current_version: 0 });
    assert_eq!(db.tracking.len().unwrap(), 1);

    let saved = db
        .pastes
        .conditional_save_acking(&viewed, 0, delivery.seq)
        .expect("save");
    assert!(matches!(saved, SaveOutcome::Saved(ref row) if row.views == 1));
    assert_eq!(db.tracking.len().unwrap(), 0);
}
