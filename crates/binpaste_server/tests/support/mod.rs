//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use binpaste_server::{
    create_app,
    db::PasteStore,
    tracking::{TrackingSettings, TrackingWorker},
    AppState, Config, Database, PasteService,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Running test server plus the handles needed to inspect storage.
///
/// Field order matters: the worker must stop before the temp dir is removed.
pub(crate) struct TestApp {
    pub(crate) server: TestServer,
    pub(crate) db: Database,
    _worker: TrackingWorker,
    _temp: TempDir,
}

impl TestApp {
    /// Stored view count for `id`, or `None` once the row is purged.
    pub(crate) fn stored_views(&self, id: &str) -> Option<u64> {
        self.db
            .pastes
            .get(id)
            .expect("get paste")
            .map(|paste| paste.views)
    }

    /// Polls storage until `id` has `expected` views or the timeout elapses.
    pub(crate) async fn wait_for_views(&self, id: &str, expected: u64) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while tokio::time::Instant::now() < deadline {
            if self.stored_views(id) == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.stored_views(id) == Some(expected)
    }
}

pub(crate) fn test_config_for_db_path(db_path: &Path) -> Config {
    Config {
        port: 0,
        db_path: db_path.to_str().expect("db path").to_string(),
        tracking_poll_interval_ms: 10,
        ..Config::from_lookup(|_| None)
    }
}

pub(crate) fn test_app_for_config(config: Config, temp: TempDir) -> TestApp {
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let (worker, sender) = TrackingWorker::spawn(
        db.pastes.clone(),
        db.tracking.clone(),
        TrackingSettings::from_config(&config),
    )
    .expect("spawn tracking worker");
    let service = PasteService::from_database(&db, sender, &config);
    let state = AppState::new(config, service);
    let server = TestServer::new(create_app(state, false)).expect("server");
    TestApp {
        server,
        db,
        _worker: worker,
        _temp: temp,
    }
}

pub(crate) fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let config = test_config_for_db_path(&db_path);
    test_app_for_config(config, temp_dir)
}
