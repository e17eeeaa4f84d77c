//! End-to-end archival against a temporary backing store.

mod common;

use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::{PermissionsExt, symlink};

use collectfs_core::{CollectError, CollectOutcome, Collector};
use common::{Fixture, STAMP};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

#[test]
fn test_report_is_archived_then_disambiguated() {
    let fx = Fixture::new();
    let archiver = fx.archiver();

    fx.write("/docs/report.txt", "first draft");
    let outcome = archiver.collect(OsStr::new("/docs/report.txt")).unwrap();
    let first = fx.trash(&format!("/docs/report.txt.{STAMP}"));
    assert!(matches!(&outcome, CollectOutcome::Collected { archived, .. } if *archived == first));
    assert!(!fx.real("/docs/report.txt").exists());
    assert_eq!(fs::read_to_string(&first).unwrap(), "first draft");

    fx.write("/docs/report.txt", "second draft");
    archiver.collect(OsStr::new("/docs/report.txt")).unwrap();
    fx.write("/docs/report.txt", "third draft");
    archiver.collect(OsStr::new("/docs/report.txt")).unwrap();

    assert_eq!(
        fx.trash_listing("/docs"),
        vec![
            format!("report.txt.{STAMP}"),
            format!("report.txt.{STAMP}-0001"),
            format!("report.txt.{STAMP}-0002"),
        ]
    );
    let second = fx.trash(&format!("/docs/report.txt.{STAMP}-0001"));
    assert_eq!(fs::read_to_string(second).unwrap(), "second draft");
}

#[test]
fn test_file_at_root_lands_in_trash_root() {
    let fx = Fixture::new();
    fx.write("/notes", "n");

    fx.archiver().collect(OsStr::new("/notes")).unwrap();
    assert_eq!(fx.trash_listing("/"), vec![format!("notes.{STAMP}")]);
}

#[test]
fn test_mode_is_reported_and_kept() {
    let fx = Fixture::new();
    let real = fx.write("/bin/tool", "#!/bin/sh");
    fs::set_permissions(&real, fs::Permissions::from_mode(0o750)).unwrap();

    let outcome = fx.archiver().collect(OsStr::new("/bin/tool")).unwrap();
    let CollectOutcome::Collected { mode, archived } = outcome else {
        panic!("expected a collected file, got {outcome:?}");
    };
    assert_eq!(mode & 0o7777, 0o750);
    let kept = fs::metadata(archived).unwrap().permissions().mode();
    assert_eq!(kept & 0o7777, 0o750);
}

#[test]
fn test_trash_mirror_is_private() {
    let fx = Fixture::new();
    fx.write("/a/b/c.txt", "x");
    fx.archiver().collect(OsStr::new("/a/b/c.txt")).unwrap();

    for dir in ["/", "/a", "/a/b"] {
        let mode = fs::metadata(fx.trash(dir)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700, "{dir}");
    }
}

#[test]
fn test_missing_file_has_no_side_effects() {
    let fx = Fixture::new();
    let outcome = fx.archiver().collect(OsStr::new("/nested/missing.txt")).unwrap();

    assert_eq!(outcome, CollectOutcome::DoesNotExist);
    assert!(!fx.config.trash_root().exists());
}

#[test]
fn test_missing_parent_through_file_is_absent() {
    let fx = Fixture::new();
    fx.write("/plain", "x");

    let outcome = fx.archiver().collect(OsStr::new("/plain/child")).unwrap();
    assert_eq!(outcome, CollectOutcome::DoesNotExist);
}

#[test]
fn test_non_regular_entries_are_left_alone() {
    let fx = Fixture::new();
    fs::create_dir(fx.real("/dir")).unwrap();
    mkfifo(&fx.real("/pipe"), Mode::from_bits_truncate(0o600)).unwrap();
    fx.write("/target", "t");
    symlink(fx.real("/target"), fx.real("/link")).unwrap();

    let archiver = fx.archiver();
    for path in ["/dir", "/pipe", "/link"] {
        let outcome = archiver.collect(OsStr::new(path)).unwrap();
        assert!(
            matches!(outcome, CollectOutcome::NotCollectable { .. }),
            "{path}: {outcome:?}"
        );
        assert!(fs::symlink_metadata(fx.real(path)).is_ok(), "{path}");
    }
    assert!(fs::symlink_metadata(fx.real("/link")).unwrap().file_type().is_symlink());
    assert!(!fx.config.trash_root().exists());
}

#[test]
fn test_trash_segment_blocked_by_file() {
    let fx = Fixture::new();
    fx.write("/docs/report.txt", "keep me");
    fs::create_dir(fx.config.trash_root()).unwrap();
    fs::write(fx.trash("/docs"), "in the way").unwrap();

    let err = fx.archiver().collect(OsStr::new("/docs/report.txt")).unwrap_err();
    assert!(matches!(err, CollectError::NotADirectory { .. }));
    assert_eq!(err.errno(), nix::libc::ENOTDIR);
    assert_eq!(fs::read_to_string(fx.real("/docs/report.txt")).unwrap(), "keep me");
    assert_eq!(fs::read_to_string(fx.trash("/docs")).unwrap(), "in the way");
}

#[test]
fn test_trash_root_blocked_by_symlink() {
    let fx = Fixture::new();
    fx.write("/f", "x");
    fs::create_dir(fx.real("/elsewhere")).unwrap();
    symlink(fx.real("/elsewhere"), fx.config.trash_root()).unwrap();

    let err = fx.archiver().collect(OsStr::new("/f")).unwrap_err();
    assert!(matches!(err, CollectError::NotADirectory { .. }));
    assert!(fx.real("/f").exists());
    assert_eq!(fs::read_dir(fx.real("/elsewhere")).unwrap().count(), 0);
}

#[test]
fn test_path_too_long_touches_nothing() {
    let fx = Fixture::with(|config| {
        let root_len = config.root().as_os_str().len();
        config.with_max_path(root_len.saturating_add(16))
    });
    fx.write("/short", "x");

    let long = format!("/{}", "n".repeat(32));
    let err = fx.archiver().collect(OsStr::new(&long)).unwrap_err();
    assert!(matches!(err, CollectError::PathTooLong { .. }));
    assert_eq!(err.errno(), nix::libc::ENAMETOOLONG);
    assert!(!fx.config.trash_root().exists());
}

#[test]
fn test_mirrored_path_too_long_keeps_file() {
    // Fits as a real path, but not once the trash name and stamp are added.
    let fx = Fixture::with(|config| {
        let root_len = config.root().as_os_str().len();
        config.with_max_path(root_len.saturating_add(40))
    });
    let name = "d".repeat(30);
    let virtual_path = format!("/{name}");
    fx.write(&virtual_path, "x");

    let err = fx.archiver().collect(OsStr::new(&virtual_path)).unwrap_err();
    assert!(matches!(err, CollectError::PathTooLong { .. }));
    assert!(fx.real(&virtual_path).exists());
}
