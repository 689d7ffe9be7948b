//! Snapshot lifecycle against in-memory mounts and a directory backend.

mod common;

use std::fs;

use chrono::{SubsecRound, Utc};
use common::{Harness, SUBVOLUME};
use samin_common::{SaminError, SnapshotId, SnapshotSelector};

fn id(n: u64) -> SnapshotId {
    SnapshotId::new(n).unwrap()
}

fn select(s: &str) -> SnapshotSelector {
    s.parse().unwrap()
}

#[test_log::test]
fn create_config_is_idempotent() {
    let h = Harness::new();

    h.manager.create_config(SUBVOLUME, &h.device).unwrap();
    h.manager.create_config(SUBVOLUME, &h.device).unwrap();

    let paths = &h.manager.config().paths;
    assert!(paths.control_area().is_dir());
    assert!(paths.snapshots(SUBVOLUME).is_dir());
    assert_eq!(h.mounts.state().mounts, 2);
    h.assert_released();
}

#[test]
fn operations_need_a_config() {
    let h = Harness::new();

    let err = h
        .manager
        .take_snapshot(SUBVOLUME, &h.device, None)
        .unwrap_err();
    assert!(matches!(err, SaminError::ConfigNotFound { .. }));

    let err = h.manager.list_snapshots(SUBVOLUME, &h.device).unwrap_err();
    assert!(matches!(err, SaminError::ConfigNotFound { .. }));

    let err = h.manager.delete_config(SUBVOLUME, &h.device).unwrap_err();
    assert!(matches!(err, SaminError::ConfigNotFound { .. }));

    h.assert_released();
}

#[test]
fn wrong_filesystem_mounts_nothing() {
    let h = Harness::with_probe("ext4");

    let err = h.manager.create_config(SUBVOLUME, &h.device).unwrap_err();

    assert!(matches!(err, SaminError::FilesystemMismatch { .. }));
    assert_eq!(h.mounts.state().mounts, 0);
    assert!(!h.manager.config().paths.control_area().exists());
}

#[test]
fn invalid_subvolume_names_are_rejected() {
    let h = Harness::configured();
    let err = h
        .manager
        .take_snapshot("../etc", &h.device, None)
        .unwrap_err();
    assert!(matches!(err, SaminError::InvalidSubvolume { .. }));
}

#[test]
fn identifiers_are_sequential_and_never_reused() {
    let h = Harness::configured();

    assert_eq!([h.take("a"), h.take("b"), h.take("c")], [1, 2, 3]);

    h.manager
        .delete_snapshots(SUBVOLUME, &h.device, &select("2"))
        .unwrap();
    assert_eq!(h.take("d"), 4);
    assert_eq!(h.listed_ids(), [1, 3, 4]);

    h.manager
        .delete_snapshots(SUBVOLUME, &h.device, &select("1,3-4"))
        .unwrap();
    assert!(h.listed_ids().is_empty());
    assert_eq!(h.take("e"), 1);

    h.assert_released();
}

#[test]
fn listing_sorts_numerically_past_nine() {
    let h = Harness::configured();
    for n in 1..=11 {
        h.take(&format!("snapshot {n}"));
    }

    assert_eq!(h.listed_ids(), (1..=11).collect::<Vec<_>>());
    assert_eq!(h.take("twelfth"), 12);
}

#[test]
fn empty_set_lists_nothing() {
    let h = Harness::configured();
    assert!(h.listed_ids().is_empty());
}

#[test]
fn description_and_timestamp_round_trip() {
    let h = Harness::configured();

    let before = Utc::now().trunc_subsecs(0);
    h.take("x");
    let after = Utc::now();

    let entries = h.manager.list_snapshots(SUBVOLUME, &h.device).unwrap();
    let metadata = entries[0].metadata.as_ref().unwrap();
    assert_eq!(metadata.description, "x");
    assert!(metadata.date >= before && metadata.date <= after);
    assert_eq!(metadata.date.timestamp_subsec_nanos(), 0);

    let raw = fs::read_to_string(
        h.manager
            .config()
            .paths
            .snapshot_record(SUBVOLUME, id(1))
            .join("metadata.json"),
    )
    .unwrap();
    assert!(!raw.contains('Z'), "date must not carry a zone suffix: {raw}");
}

#[test]
fn default_description() {
    let h = Harness::configured();
    h.manager.take_snapshot(SUBVOLUME, &h.device, None).unwrap();

    let entries = h.manager.list_snapshots(SUBVOLUME, &h.device).unwrap();
    assert_eq!(
        entries[0].metadata.as_ref().unwrap().description,
        "No description given"
    );
}

#[test]
fn snapshots_are_read_only_copies_of_the_live_subvolume() {
    let h = Harness::configured();
    h.write_live("before");
    h.take("x");
    h.write_live("after");

    let snapshot = h.snapshot_path(1);
    assert_eq!(
        fs::read_to_string(snapshot.join("data.txt")).unwrap(),
        "before"
    );
    assert!(h.backend.state().read_only.contains(&snapshot));
}

#[test]
fn failed_snapshot_gives_the_number_back() {
    let h = Harness::configured();
    h.backend.state().fail_snapshots = true;

    let err = h
        .manager
        .take_snapshot(SUBVOLUME, &h.device, Some("x"))
        .unwrap_err();
    assert!(matches!(err, SaminError::BackendFailure { .. }));
    h.assert_released();

    h.backend.state().fail_snapshots = false;
    assert_eq!(h.take("y"), 1);
}

#[test]
fn corrupt_metadata_does_not_hide_other_records() {
    let h = Harness::configured();
    h.take("one");
    h.take("two");
    fs::remove_file(
        h.manager
            .config()
            .paths
            .snapshot_record(SUBVOLUME, id(1))
            .join("metadata.json"),
    )
    .unwrap();

    let entries = h.manager.list_snapshots(SUBVOLUME, &h.device).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(matches!(
        entries[0].metadata,
        Err(SaminError::MetadataCorrupt { .. })
    ));
    assert_eq!(entries[1].metadata.as_ref().unwrap().description, "two");
}

#[test]
fn busy_snapshot_is_skipped_and_the_batch_continues() {
    let h = Harness::configured();
    for n in 1..=5 {
        h.take(&n.to_string());
    }
    let busy = h.backend.subvolume_id_of(&h.snapshot_path(4));
    h.mounts.state().busy_ids.insert(busy);

    let report = h
        .manager
        .delete_snapshots(SUBVOLUME, &h.device, &select("2,4-5"))
        .unwrap();

    assert_eq!(report.deleted, [id(2), id(5)]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, id(4));
    assert!(matches!(
        report.skipped[0].reason,
        SaminError::SnapshotBusy { .. }
    ));
    assert!(!report.is_complete());
    assert_eq!(h.listed_ids(), [1, 3, 4]);
    h.assert_released();
}

#[test]
fn missing_and_duplicate_ids_are_skipped() {
    let h = Harness::configured();
    h.take("one");

    let report = h
        .manager
        .delete_snapshots(SUBVOLUME, &h.device, &select("1,1,7"))
        .unwrap();

    assert_eq!(report.deleted, [id(1)]);
    let skipped: Vec<u64> = report.skipped.iter().map(|s| s.id.get()).collect();
    assert_eq!(skipped, [1, 7]);
    assert!(report
        .skipped
        .iter()
        .all(|s| matches!(s.reason, SaminError::SnapshotNotFound { .. })));
}

#[test]
fn deleting_removes_snapshot_and_metadata() {
    let h = Harness::configured();
    h.take("one");
    let record = h.manager.config().paths.snapshot_record(SUBVOLUME, id(1));

    h.manager
        .delete_snapshots(SUBVOLUME, &h.device, &SnapshotSelector::single(id(1)))
        .unwrap();

    assert_eq!(h.backend.state().deleted, [record.join("snapshot")]);
    assert!(!record.exists());
}

#[test]
fn rollback_swaps_in_the_target_and_keeps_the_old_state() {
    let h = Harness::configured();
    h.write_live("v1");
    h.take("first");
    h.write_live("v2");
    h.take("second");
    h.write_live("v3");

    let saved = h.manager.rollback(SUBVOLUME, &h.device, id(1)).unwrap();

    assert_eq!(saved, id(3));
    assert_eq!(h.read_live(), "v1");
    assert_eq!(
        fs::read_to_string(h.snapshot_path(3).join("data.txt")).unwrap(),
        "v3"
    );
    assert!(!h.backend.state().read_only.contains(&h.live()));

    let entries = h.manager.list_snapshots(SUBVOLUME, &h.device).unwrap();
    let rolled = entries.iter().find(|e| e.id == id(3)).unwrap();
    assert_eq!(
        rolled.metadata.as_ref().unwrap().description,
        "rolled back to 1"
    );

    // the pre-rollback state is an ordinary snapshot
    let report = h
        .manager
        .delete_snapshots(SUBVOLUME, &h.device, &select("3"))
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(h.listed_ids(), [1, 2]);
    h.assert_released();
}

#[test]
fn rollback_to_missing_snapshot_changes_nothing() {
    let h = Harness::configured();
    h.take("first");

    let err = h.manager.rollback(SUBVOLUME, &h.device, id(9)).unwrap_err();

    assert!(matches!(err, SaminError::SnapshotNotFound { .. }));
    assert_eq!(h.listed_ids(), [1]);
    assert_eq!(h.read_live(), "v1");
    h.assert_released();
}

#[test]
fn interrupted_rollback_reports_where_the_subvolume_went() {
    let h = Harness::configured();
    h.take("first");
    h.write_live("v2");
    h.backend.state().fail_snapshots = true;

    let err = h.manager.rollback(SUBVOLUME, &h.device, id(1)).unwrap_err();

    match err {
        SaminError::RollbackIncomplete { parked, source, .. } => {
            assert_eq!(parked, h.snapshot_path(2));
            assert_eq!(
                fs::read_to_string(parked.join("data.txt")).unwrap(),
                "v2"
            );
            assert!(matches!(*source, SaminError::BackendFailure { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!h.live().exists());
    h.assert_released();
}

#[test]
fn delete_config_removes_every_snapshot_first() {
    let h = Harness::configured();
    for n in 1..=3 {
        h.take(&n.to_string());
    }

    h.manager.delete_config(SUBVOLUME, &h.device).unwrap();

    assert_eq!(h.backend.state().deleted.len(), 3);
    assert!(!h.manager.config().paths.subvolume_config(SUBVOLUME).exists());
    assert!(h.manager.config().paths.control_area().exists());
    h.assert_released();
}

#[test]
fn delete_config_without_snapshots() {
    let h = Harness::configured();
    h.manager.delete_config(SUBVOLUME, &h.device).unwrap();
    assert!(!h.manager.config().paths.subvolume_config(SUBVOLUME).exists());
}

#[test]
fn delete_config_keeps_config_while_a_snapshot_is_mounted() {
    let h = Harness::configured();
    h.take("one");
    h.take("two");
    let busy = h.backend.subvolume_id_of(&h.snapshot_path(2));
    h.mounts.state().busy_ids.insert(busy);

    let err = h.manager.delete_config(SUBVOLUME, &h.device).unwrap_err();

    assert!(matches!(
        err,
        SaminError::ConfigNotEmpty { remaining: 1, .. }
    ));
    assert_eq!(h.listed_ids(), [2]);
    h.assert_released();
}

#[test]
fn already_mounted_control_area_is_not_mounted_again() {
    let h = Harness::configured();
    let mountpoint = h.manager.config().paths.mountpoint.clone();
    h.mounts.state().mounted.insert(mountpoint);

    h.take("x");

    let state = h.mounts.state();
    assert_eq!(state.mounts, 1);
    assert_eq!(state.unmounts, 2);
}

#[test]
fn record_without_its_snapshot_lists_as_corrupt() {
    let h = Harness::configured();
    h.take("one");
    h.take("two");
    fs::remove_dir_all(h.snapshot_path(1)).unwrap();

    let entries = h.manager.list_snapshots(SUBVOLUME, &h.device).unwrap();

    assert_eq!(entries.len(), 2);
    assert!(matches!(
        entries[0].metadata,
        Err(SaminError::MetadataCorrupt { .. })
    ));
    assert_eq!(entries[1].metadata.as_ref().unwrap().description, "two");
}

#[test]
fn rollback_without_live_subvolume_leaves_no_record() {
    let h = Harness::configured();
    h.take("one");
    fs::remove_dir_all(h.live()).unwrap();

    let err = h.manager.rollback(SUBVOLUME, &h.device, id(1)).unwrap_err();

    assert!(matches!(err, SaminError::Io(_)));
    assert_eq!(h.listed_ids(), [1]);
    assert!(
        !h.manager
            .config()
            .paths
            .snapshot_record(SUBVOLUME, id(2))
            .exists()
    );
    h.assert_released();

    // the freed number is handed out again
    h.recreate_live();
    assert_eq!(h.take("two"), 2);
}
