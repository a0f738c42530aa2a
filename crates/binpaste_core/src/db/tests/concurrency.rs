//! Concurrency tests for version-guarded writes.

use super::*;

#[test]
fn racing_conditional_saves_admit_exactly_one_winner() {
    let (db, _temp) = setup_test_db();
    let paste = insert_paste(&db, "contended", Exposure::Public);

    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|idx| {
            let worker = db.clone();
            let barrier = barrier.clone();
            let mut edited = paste.clone();
            edited.views = idx as u64 + 1;
            thread::spawn(move || {
                barrier.wait();
                worker
                    .pastes
                    .conditional_save(&edited, 0)
                    .expect("conditional save should not fail")
            })
        })
        .collect();

    let outcomes: Vec<SaveOutcome> = handles
        .into_iter()
        .map(|handle| handle.join().expect("writer join"))
        .collect();

    let winners: Vec<&Paste> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            SaveOutcome::Saved(saved) => Some(saved),
            _ => None,
        })
        .collect();
    assert_eq!(winners.len(), 1, "outcomes: {:?}", outcomes);
    assert!(outcomes.iter().all(|outcome| matches!(
        outcome,
        SaveOutcome::Saved(_) | SaveOutcome::VersionConflict { current_version: 1 }
    )));

    let stored = db.pastes.get(&paste.id).unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.views, winners[0].views);
}

#[test]
fn bulk_update_conflicts_with_stale_single_row_save() {
    let (db, _temp) = setup_test_db();
    let paste = insert_paste(&db, "contended", Exposure::Public);

    db.pastes
        .bulk_update_where(&|_| true, &|paste| {
            paste.date_deleted = Some(Utc::now())
        })
        .unwrap();

    let mut stale = paste.clone();
    stale.views = 1;
    assert_eq!(
        db.pastes.conditional_save(&stale, 0).unwrap(),
        SaveOutcome::VersionConflict { current_version: 1 }
    );
    assert!(db.pastes.get(&paste.id).unwrap().unwrap().date_deleted.is_some());
}
