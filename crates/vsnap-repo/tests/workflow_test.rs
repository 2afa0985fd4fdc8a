//! End-to-end repository workflows against a real working tree.

use rusqlite::Connection;
use vsnap_config::testing::TestEnvironment;
use vsnap_config::Config;
use vsnap_repo::{api, ErrorKind, Repository};

fn init(env: &TestEnvironment) -> Repository {
    Repository::create_with_config(&env.project_root, Config::default()).unwrap()
}

fn init_with(env: &TestEnvironment, config: Config) -> Repository {
    Repository::create_with_config(&env.project_root, config).unwrap()
}

/// Sorted (repo path, content) pairs of the working tree.
fn snapshot(repo: &Repository) -> Vec<(String, Vec<u8>)> {
    repo.scanner()
        .scan()
        .files
        .into_iter()
        .map(|f| {
            let content = std::fs::read(&f.path).unwrap();
            (f.repo_path, content)
        })
        .collect()
}

fn raw_connection(env: &TestEnvironment) -> Connection {
    Connection::open(env.db_path()).unwrap()
}

#[test]
fn test_identical_content_stored_once() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"shared").unwrap();
    env.create_file("nested/deeper/b.txt", b"shared").unwrap();
    env.create_file("c.txt", b"unique").unwrap();

    let first = repo.commit("first").unwrap();
    assert_eq!(first.files.len(), 3);
    assert_eq!(first.new_blobs, 2);

    let second = repo.commit("again").unwrap();
    assert_eq!(second.new_blobs, 0);

    let stats = repo.stats().unwrap();
    assert_eq!(stats.blobs.blob_count, 2);
    assert_eq!(stats.commits, 2);
    assert_eq!(stats.tracked_entries, 6);
    assert_eq!(stats.latest_commit, Some(second.id));
}

#[test]
fn test_checkout_after_commit_reproduces_tree() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("README.md", b"# readme\n").unwrap();
    env.create_file("src/main.rs", b"fn main() {}\n").unwrap();
    env.create_file("assets/logo.bin", &[0u8, 159, 146, 150, 255]).unwrap();
    env.create_file("empty.txt", b"").unwrap();

    let before = snapshot(&repo);
    let commit = repo.commit("baseline").unwrap();

    env.create_file("README.md", b"rewritten").unwrap();
    env.remove_file("src/main.rs").unwrap();
    env.create_file("scratch/notes.txt", b"temporary").unwrap();

    let result = repo.checkout(commit.id).unwrap();
    assert_eq!(result.files_written, 4);
    assert_eq!(result.files_deleted, 1);
    assert_eq!(snapshot(&repo), before);
}

#[test]
fn test_log_is_newest_first() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);

    let a = repo.commit("A").unwrap();
    env.create_file("b.txt", b"b").unwrap();
    let b = repo.commit("B").unwrap();
    env.create_file("c.txt", b"c").unwrap();
    let c = repo.commit("C").unwrap();

    let log = repo.log().unwrap();
    let ids: Vec<_> = log.iter().map(|e| e.id).collect();
    assert_eq!(ids, [c.id, b.id, a.id]);
    assert!(a.id < b.id && b.id < c.id);
    assert_eq!(log[0].message, "C");
    assert_eq!(log[0].timestamp, c.timestamp);

    let newest = repo.log_limited(2).unwrap();
    assert_eq!(newest.len(), 2);
    assert_eq!(newest[1].id, b.id);

    assert_eq!(repo.get_commit(a.id).unwrap().message, "A");
}

#[test]
fn test_checkout_twice_is_idempotent() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"alpha").unwrap();
    env.create_file("dir/b.txt", b"beta").unwrap();
    let commit = repo.commit("two files").unwrap();

    env.create_file("stray.txt", b"stray").unwrap();
    let first = repo.checkout(commit.id).unwrap();
    assert_eq!(first.files_deleted, 1);
    let after_first = snapshot(&repo);

    let second = repo.checkout(commit.id).unwrap();
    assert_eq!(second.files_deleted, 0);
    assert_eq!(second.files_written, 2);
    assert_eq!(snapshot(&repo), after_first);
}

#[test]
fn test_unknown_commit_leaves_tree_alone() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("keep.txt", b"keep").unwrap();
    repo.commit("one").unwrap();
    env.create_file("uncommitted.txt", b"still here").unwrap();

    let before = snapshot(&repo);
    let err = repo.checkout(9999).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "Commit ID 9999 not found");
    assert_eq!(snapshot(&repo), before);
}

#[test]
fn test_checkout_deletes_files_absent_from_target() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);

    env.create_file("a.txt", b"a").unwrap();
    env.create_file("b.txt", b"b").unwrap();
    let one = repo.commit("a and b").unwrap();

    env.remove_file("b.txt").unwrap();
    let two = repo.commit("only a").unwrap();
    assert_eq!(two.files.len(), 1);

    let result = repo.checkout(one.id).unwrap();
    assert_eq!(result.files_deleted, 0);
    assert_eq!(env.read_file("b.txt").unwrap(), b"b");

    env.create_file("c.txt", b"c").unwrap();
    let result = repo.checkout(two.id).unwrap();
    assert_eq!(result.files_deleted, 2);
    assert!(!env.exists("b.txt"));
    assert!(!env.exists("c.txt"));
    assert_eq!(env.read_file("a.txt").unwrap(), b"a");
    assert_eq!(
        result.summary,
        format!(
            "Successfully checked out commit {}. Wrote 1 files, deleted 2 files.",
            two.id
        )
    );
}

#[test]
fn test_emptied_directories_are_kept() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);

    env.create_dir("empty").unwrap();
    let base = repo.commit("base").unwrap();
    assert!(base.files.is_empty());

    env.create_file("docs/guide.md", b"guide").unwrap();
    let result = repo.checkout(base.id).unwrap();

    assert_eq!(result.files_deleted, 1);
    assert!(!env.exists("docs/guide.md"));
    assert!(env.project_root.join("docs").is_dir());
    assert!(env.project_root.join("empty").is_dir());
}

#[cfg(unix)]
#[test]
fn test_backslash_file_name_round_trips() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"a").unwrap();
    env.create_file("odd\\name.txt", b"odd").unwrap();

    let commit = repo.commit("odd names").unwrap();
    let paths: Vec<_> = commit.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["a.txt", "odd\\name.txt"]);

    env.create_file("odd\\name.txt", b"changed").unwrap();
    let result = repo.checkout(commit.id).unwrap();
    assert_eq!(result.files_written, 2);
    assert_eq!(env.read_file("odd\\name.txt").unwrap(), b"odd");

    let content = repo.working_file_content("odd\\name.txt").unwrap();
    assert!(content.exists);
    assert_eq!(content.content, b"odd");
}

#[test]
fn test_checkout_switches_path_between_file_and_directory() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);

    env.create_file("x", b"plain file").unwrap();
    let as_file = repo.commit("x is a file").unwrap();

    env.remove_file("x").unwrap();
    env.create_file("x/y.txt", b"nested").unwrap();
    let as_dir = repo.commit("x is a directory").unwrap();

    let result = repo.checkout(as_file.id).unwrap();
    assert_eq!(result.files_written, 1);
    assert_eq!(result.files_deleted, 1);
    assert_eq!(env.read_file("x").unwrap(), b"plain file");

    let retry = repo.checkout(as_file.id).unwrap();
    assert_eq!(retry.files_deleted, 0);

    let result = repo.checkout(as_dir.id).unwrap();
    assert_eq!(result.files_deleted, 1);
    assert_eq!(env.read_file("x/y.txt").unwrap(), b"nested");
}

#[test]
fn test_untracked_content_blocking_a_file_fails_and_is_kept() {
    let env = TestEnvironment::new().unwrap();
    let mut config = Config::default();
    config.scan.ignore = vec!["*.log".to_string()];
    let repo = init_with(&env, config);

    env.create_file("x", b"file").unwrap();
    let commit = repo.commit("file").unwrap();

    env.remove_file("x").unwrap();
    env.create_file("x/debug.log", b"keep me").unwrap();

    let err = repo.checkout(commit.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileSystem);
    assert_eq!(env.read_file("x/debug.log").unwrap(), b"keep me");
}

#[cfg(unix)]
#[test]
fn test_checkout_never_writes_through_symlinked_directory() {
    let env = TestEnvironment::new().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let repo = init(&env);

    env.create_file("sub/a.txt", b"tracked").unwrap();
    let commit = repo.commit("sub").unwrap();

    std::fs::remove_dir_all(env.project_root.join("sub")).unwrap();
    std::os::unix::fs::symlink(outside.path(), env.project_root.join("sub")).unwrap();

    let result = repo.checkout(commit.id).unwrap();
    assert_eq!(result.files_written, 1);
    assert!(!outside.path().join("a.txt").exists());
    assert!(std::fs::symlink_metadata(env.project_root.join("sub"))
        .unwrap()
        .is_dir());
    assert_eq!(env.read_file("sub/a.txt").unwrap(), b"tracked");
}

#[test]
fn test_max_depth_truncation_is_reported_by_commit() {
    let env = TestEnvironment::new().unwrap();
    let mut config = Config::default();
    config.scan.max_depth = 1;
    let repo = init_with(&env, config);

    env.create_file("top.txt", b"top").unwrap();
    env.create_file("deep/below.txt", b"below").unwrap();

    let commit = repo.commit("shallow").unwrap();
    assert_eq!(commit.files.len(), 1);
    assert_eq!(commit.skipped.len(), 1);
    assert_eq!(commit.skipped[0].path, env.project_root.join("deep"));
}

#[test]
fn test_missing_blob_fails_before_any_write() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"one").unwrap();
    env.create_file("b.txt", b"two").unwrap();
    let commit = repo.commit("baseline").unwrap();

    env.create_file("a.txt", b"edited after commit").unwrap();
    env.create_file("extra.txt", b"extra").unwrap();

    let conn = raw_connection(&env);
    conn.pragma_update(None, "foreign_keys", "OFF").unwrap();
    let two = vsnap_cas::ContentHash::of(b"two");
    conn.execute("DELETE FROM blobs WHERE hash = ?1", [two.as_str()])
        .unwrap();
    drop(conn);

    let err = repo.checkout(commit.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(err.to_string().contains("b.txt"));

    assert_eq!(env.read_file("a.txt").unwrap(), b"edited after commit");
    assert!(env.exists("extra.txt"));
    assert_eq!(env.read_file("b.txt").unwrap(), b"two");
}

#[test]
fn test_unsafe_stored_path_is_integrity_error() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"a").unwrap();
    let commit = repo.commit("baseline").unwrap();

    let hash = vsnap_cas::ContentHash::of(b"a");
    raw_connection(&env)
        .execute(
            "INSERT INTO commit_files (commit_id, path, hash) VALUES (?1, '../escape.txt', ?2)",
            rusqlite::params![commit.id, hash.as_str()],
        )
        .unwrap();

    let err = repo.checkout(commit.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(!env.project_root.join("../escape.txt").exists());
}

#[test]
fn test_failed_commit_rolls_back_everything() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("fine.txt", b"fine").unwrap();
    env.create_file("poison.txt", b"poison").unwrap();

    raw_connection(&env)
        .execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON commit_files
             WHEN NEW.path = 'poison.txt'
             BEGIN SELECT RAISE(ABORT, 'poisoned path'); END;",
        )
        .unwrap();

    let err = repo.commit("doomed").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transaction);
    assert!(repo.log().unwrap().is_empty());
    assert_eq!(repo.stats().unwrap().blobs.blob_count, 0);

    env.remove_file("poison.txt").unwrap();
    let ok = repo.commit("recovered").unwrap();
    let log = repo.log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, ok.id);
    assert_eq!(repo.commit_files(ok.id).unwrap().len(), 1);
}

#[test]
fn test_create_twice_and_log_uninitialized() {
    let env = TestEnvironment::new().unwrap();

    let err = Repository::open_with_config(&env.project_root, Config::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("Has the repo been initialized?"));

    init(&env);
    let repo = init(&env);
    assert!(repo.log().unwrap().is_empty());
}

#[test]
fn test_empty_tree_commit() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    let commit = repo.commit("").unwrap();
    assert!(commit.files.is_empty());
    assert!(repo.commit_files(commit.id).unwrap().is_empty());
    assert_eq!(repo.get_commit(commit.id).unwrap().message, "");
}

#[test]
fn test_commit_files_sorted_and_unknown_commit() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("z.txt", b"z").unwrap();
    env.create_file("a/b.txt", b"b").unwrap();
    env.create_file("m.txt", b"m").unwrap();
    let commit = repo.commit("three").unwrap();

    let paths: Vec<_> = repo
        .commit_files(commit.id)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, ["a/b.txt", "m.txt", "z.txt"]);

    assert_eq!(
        repo.commit_files(commit.id + 1).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_blob_and_working_file_lookups() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("doc.txt", b"version one").unwrap();
    let commit = repo.commit("v1").unwrap();
    env.create_file("doc.txt", b"version two").unwrap();

    let hash = commit.files[0].hash.as_str().to_uppercase();
    assert_eq!(repo.blob_content(&hash).unwrap(), b"version one");
    assert_eq!(
        repo.working_file_content("doc.txt").unwrap().content,
        b"version two"
    );

    let missing = repo.working_file_content("deleted.txt").unwrap();
    assert!(!missing.exists);
    assert!(missing.content.is_empty());
}

#[test]
fn test_metadata_and_nested_repos_survive_checkout() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"a").unwrap();
    let commit = repo.commit("one").unwrap();

    env.create_file("sub/.vsnap/db.sqlite", b"nested repo").unwrap();
    repo.checkout(commit.id).unwrap();

    assert!(env.db_path().is_file());
    assert_eq!(
        env.read_file("sub/.vsnap/db.sqlite").unwrap(),
        b"nested repo"
    );
}

#[test]
fn test_ignored_files_neither_committed_nor_deleted() {
    let env = TestEnvironment::new().unwrap();
    let mut config = Config::default();
    config.scan.ignore = vec!["target".into(), "*.log".into()];
    let repo = init_with(&env, config);

    env.create_file("src/lib.rs", b"lib").unwrap();
    env.create_file("target/debug/app", b"binary").unwrap();
    env.create_file("build.log", b"log").unwrap();

    let commit = repo.commit("sources").unwrap();
    let paths: Vec<_> = commit.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["src/lib.rs"]);

    let result = repo.checkout(commit.id).unwrap();
    assert_eq!(result.files_deleted, 0);
    assert!(env.exists("target/debug/app"));
    assert!(env.exists("build.log"));
}

#[test]
fn test_skip_unchanged_counts_identical_files() {
    let env = TestEnvironment::new().unwrap();
    let mut config = Config::default();
    config.checkout.skip_unchanged = true;
    let repo = init_with(&env, config);

    env.create_file("same.txt", b"same").unwrap();
    env.create_file("edit.txt", b"original").unwrap();
    let commit = repo.commit("base").unwrap();
    env.create_file("edit.txt", b"modified").unwrap();

    let plan = repo.plan_checkout(commit.id).unwrap();
    assert_eq!(plan.pending_writes(), 1);

    let result = repo.checkout(commit.id).unwrap();
    assert_eq!(result.files_unchanged, 1);
    assert_eq!(result.files_written, 1);
    assert_eq!(env.read_file("edit.txt").unwrap(), b"original");
}

#[test]
fn test_plan_checkout_does_not_mutate() {
    let env = TestEnvironment::new().unwrap();
    let repo = init(&env);
    env.create_file("a.txt", b"a").unwrap();
    let commit = repo.commit("a").unwrap();
    env.create_file("a.txt", b"changed").unwrap();
    env.create_file("new.txt", b"new").unwrap();

    let plan = repo.plan_checkout(commit.id).unwrap();
    assert_eq!(plan.writes.len(), 1);
    let deletes: Vec<_> = plan.deletes.iter().map(|d| d.repo_path.as_str()).collect();
    assert_eq!(deletes, ["new.txt"]);

    assert_eq!(env.read_file("a.txt").unwrap(), b"changed");
    assert!(env.exists("new.txt"));
}

#[test]
fn test_boundary_functions() {
    let env = TestEnvironment::new().unwrap();
    let root = &env.project_root;
    env.create_file("hello.txt", b"hello").unwrap();

    assert_eq!(api::log(root).unwrap_err().kind(), ErrorKind::NotFound);

    api::create_repository(root).unwrap();
    api::create_repository(root).unwrap();

    let commit = api::commit(root, "hello").unwrap();
    assert_eq!(api::log(root).unwrap().len(), 1);

    let files = api::get_commit_files(root, commit.id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(
        api::get_blob_content(root, files[0].hash.as_str()).unwrap(),
        b"hello"
    );

    env.remove_file("hello.txt").unwrap();
    assert!(!api::get_working_file_content(root, "hello.txt").unwrap().exists);

    let result = api::checkout(root, commit.id).unwrap();
    assert_eq!(result.files_written, 1);
    assert!(api::get_working_file_content(root, "hello.txt").unwrap().exists);
    assert_eq!(api::stats(root).unwrap().commits, 1);
}
