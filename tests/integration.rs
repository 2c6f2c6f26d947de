//! End-to-end scenarios driving the gated filesystem without a kernel mount.

use std::time::Duration;

use canaryfs::CanaryFs;
use canaryfs::access::{ManualClock, RuleEngine, RuleScope, ScriptedResponder};
use canaryfs::error::{FsError, errno};
use canaryfs::middleware::MemoryLog;
use canaryfs::ops::Op;
use canaryfs::storage::NodeStore;

struct Harness {
    fs: CanaryFs,
    script: ScriptedResponder,
    log: MemoryLog,
    clock: ManualClock,
}

fn harness(capacity: u64, scope: RuleScope, answers: &[&str]) -> Harness {
    let script = ScriptedResponder::new(answers.iter().copied());
    let log = MemoryLog::new();
    let clock = ManualClock::new();
    let engine = RuleEngine::with_responder(true, scope, script.clone()).with_clock(clock.clone());
    let fs = CanaryFs::with_parts(NodeStore::new(capacity), engine, log.clone());
    Harness {
        fs,
        script,
        log,
        clock,
    }
}

fn unguarded(capacity: u64) -> CanaryFs {
    CanaryFs::new(capacity, false, RuleScope::PerOperation)
}

#[test]
fn test_capacity_ceiling() {
    let mut fs = unguarded(20);
    fs.create("/f", 0o644).unwrap();

    assert_eq!(fs.write("/f", 0, b"0123456789").unwrap(), 10);
    assert_eq!(fs.store().used(), 10);
    assert_eq!(fs.write("/f", 10, b"0123456789").unwrap(), 10);
    assert_eq!(fs.store().used(), 20);

    let err = fs.write("/f", 20, b"x").unwrap_err();
    assert!(matches!(err, FsError::OutOfSpace { .. }));
    assert_eq!(errno(&err), libc::ENOSPC);
    assert_eq!(fs.store().used(), 20);
    assert_eq!(fs.read("/f", 0, 64).unwrap(), b"01234567890123456789");
}

#[test]
fn test_overwrite_inside_file_needs_no_space() {
    let mut fs = unguarded(4);
    fs.create("/f", 0o644).unwrap();
    fs.write("/f", 0, b"abcd").unwrap();
    fs.write("/f", 1, b"XY").unwrap();
    assert_eq!(fs.read("/f", 0, 4).unwrap(), b"aXYd");
    assert_eq!(fs.store().used(), 4);
}

#[test]
fn test_counted_grant_runs_out() {
    let mut h = harness(1024, RuleScope::PerOperation, &["y", "y", "3", "n"]);
    h.fs.create("/secret", 0o600).unwrap();
    h.fs.write("/secret", 0, b"hunter2").unwrap();

    assert_eq!(h.fs.read("/secret", 0, 7).unwrap(), b"hunter2");
    assert_eq!(h.script.prompts(), 3);
    for _ in 0..3 {
        assert_eq!(h.fs.read("/secret", 0, 7).unwrap(), b"hunter2");
    }
    assert_eq!(h.script.prompts(), 3);
    assert_eq!(
        h.fs.read("/secret", 0, 7),
        Err(FsError::permission_denied("/secret"))
    );
    assert_eq!(h.script.prompts(), 4);
}

#[test]
fn test_timed_grant_covers_calls_until_expiry() {
    let mut h = harness(1024, RuleScope::PerOperation, &["y", "10s", "y"]);
    h.fs.create("/a", 0o644).unwrap();

    for _ in 0..20 {
        h.fs.getattr("/a").unwrap();
    }
    assert_eq!(h.script.prompts(), 2);

    h.clock.advance(Duration::from_secs(11));
    h.fs.getattr("/a").unwrap();
    assert_eq!(h.script.prompts(), 3);
}

#[test]
fn test_allowance_stays_with_old_path_after_rename() {
    let mut h = harness(1024, RuleScope::PerOperation, &["y", "5", "y", "y", "y"]);
    h.fs.create("/a", 0o644).unwrap();
    h.fs.read("/a", 0, 1).unwrap();
    h.fs.rename("/a", "/b").unwrap();
    assert_eq!(h.script.prompts(), 4);

    h.fs.read("/b", 0, 1).unwrap();
    assert_eq!(h.script.prompts(), 5);
    assert_eq!(
        h.script.questions().last().map(String::as_str),
        Some("[canaryfs] Allow read /b? (Y/n/a or <Ns>/<N>): ")
    );
}

#[test]
fn test_operation_scope_keeps_ops_apart() {
    let mut h = harness(1024, RuleScope::PerOperation, &["y", "10s", "n"]);
    h.fs.create("/a", 0o644).unwrap();

    assert!(h.fs.read("/a", 0, 1).is_ok());
    assert_eq!(
        h.fs.write("/a", 0, b"x"),
        Err(FsError::permission_denied("/a"))
    );
    assert_eq!(h.fs.store().used(), 0);
}

#[test]
fn test_path_scope_covers_every_op() {
    let mut h = harness(1024, RuleScope::PerPath, &["y", "10s"]);
    h.fs.create("/a", 0o644).unwrap();

    h.fs.read("/a", 0, 1).unwrap();
    h.fs.write("/a", 0, b"x").unwrap();
    h.fs.truncate("/a", 0).unwrap();
    h.fs.chmod("/a", 0o600).unwrap();
    assert_eq!(h.script.prompts(), 2);
}

#[test]
fn test_allow_all_silences_prompts() {
    let mut h = harness(1024, RuleScope::PerOperation, &["a"]);
    h.fs.mkdir("/d", 0o755).unwrap();
    h.fs.create("/d/f", 0o644).unwrap();
    h.fs.write("/d/f", 0, b"data").unwrap();
    h.fs.rename("/d/f", "/g").unwrap();
    h.fs.rmdir("/d").unwrap();

    assert_eq!(h.script.prompts(), 1);
    assert!(h.fs.rules().allow_all());
    assert_eq!(h.script.remaining(), 0);
}

#[test]
fn test_denial_leaves_tree_untouched() {
    let mut h = harness(1024, RuleScope::PerOperation, &["y", "n", "n", "n"]);
    h.fs.mkdir("/d", 0o755).unwrap();

    assert!(h.fs.rmdir("/d").is_err());
    assert!(h.fs.create("/d/f", 0o644).is_err());
    let err = h.fs.mkdir("/e", 0o755).unwrap_err();
    assert_eq!(errno(&err), libc::EACCES);

    assert!(h.fs.store().lookup("/d").is_ok());
    assert!(h.fs.store().lookup("/d/f").is_err());
    assert!(h.fs.store().lookup("/e").is_err());
}

#[test]
fn test_every_check_is_logged_once() {
    let mut h = harness(1024, RuleScope::PerOperation, &["a"]);
    h.fs.create("/f", 0o644).unwrap();
    h.fs.getattr("/f").unwrap();
    h.fs.statfs("/");

    assert_eq!(
        h.log.records(),
        vec![
            (Op::Create, "/f".to_string()),
            (Op::Getattr, "/f".to_string()),
            (Op::Statfs, "/".to_string()),
        ]
    );
}

#[test]
fn test_statfs_is_never_prompted() {
    let mut h = harness(4096 * 10, RuleScope::PerOperation, &["a"]);
    let before = h.fs.statfs("/");
    assert_eq!(h.script.prompts(), 0);
    assert_eq!(before.blocks, 10);
    assert_eq!(before.blocks_free, 10);

    h.fs.create("/f", 0o644).unwrap();
    h.fs.write("/f", 0, &[7u8; 4096]).unwrap();
    let after = h.fs.statfs("/");
    assert_eq!(after.blocks_free, 9);
    assert_eq!(after.blocks_available, 9);
    assert_eq!(h.log.count(Op::Statfs), 2);
}

#[test]
fn test_rename_replaces_file_and_frees_bytes() {
    let mut fs = unguarded(1024);
    fs.create("/src", 0o644).unwrap();
    fs.write("/src", 0, b"new").unwrap();
    fs.create("/dst", 0o644).unwrap();
    fs.write("/dst", 0, b"old contents").unwrap();
    assert_eq!(fs.store().used(), 15);

    fs.rename("/src", "/dst").unwrap();
    assert_eq!(fs.store().used(), 3);
    assert_eq!(fs.read("/dst", 0, 64).unwrap(), b"new");
    assert_eq!(fs.getattr("/src"), Err(FsError::not_found("/src")));
}

#[test]
fn test_rename_onto_directory_is_rejected() {
    let mut fs = unguarded(1024);
    fs.create("/f", 0o644).unwrap();
    fs.mkdir("/d", 0o755).unwrap();

    let err = fs.rename("/f", "/d").unwrap_err();
    assert_eq!(errno(&err), libc::EISDIR);
    assert!(fs.getattr("/f").is_ok());
}

#[test]
fn test_rmdir_only_when_empty() {
    let mut fs = unguarded(1024);
    fs.mkdir("/d", 0o755).unwrap();
    fs.create("/d/f", 0o644).unwrap();

    let err = fs.rmdir("/d").unwrap_err();
    assert_eq!(errno(&err), libc::ENOTEMPTY);

    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(errno(&fs.getattr("/d").unwrap_err()), libc::ENOENT);
}

#[test]
fn test_truncate_grow_zero_fills() {
    let mut fs = unguarded(1024);
    fs.create("/f", 0o644).unwrap();
    fs.write("/f", 0, b"ab").unwrap();

    let attr = fs.truncate("/f", 5).unwrap();
    assert_eq!(attr.size, 5);
    assert_eq!(fs.read("/f", 0, 16).unwrap(), b"ab\0\0\0");

    fs.truncate("/f", 1).unwrap();
    assert_eq!(fs.read("/f", 0, 16).unwrap(), b"a");
    assert_eq!(fs.store().used(), 1);
}

#[test]
fn test_readdir_lists_sorted_children() {
    let mut fs = unguarded(1024);
    fs.mkdir("/d", 0o755).unwrap();
    fs.create("/d/b", 0o644).unwrap();
    fs.create("/d/a", 0o644).unwrap();

    let names: Vec<String> = fs
        .readdir("/d")
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, [".", "..", "a", "b"]);
    assert_eq!(
        errno(&fs.readdir("/d/a").unwrap_err()),
        libc::ENOTDIR
    );
}
