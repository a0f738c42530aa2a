//! Database integration tests.

use super::*;
use crate::models::paste::*;
use crate::models::tracking::TrackingEvent;
use crate::tracking::TrackingChannel;
use chrono::{Duration, Utc};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().unwrap()).unwrap();
    (db, temp_dir)
}

fn insert_paste(db: &Database, content: &str, exposure: Exposure) -> Paste {
    db.pastes
        .insert(Paste::new(content.to_string(), exposure))
        .expect("insert")
}

mod concurrency;
mod queue;
