//! CLI integration tests for the docvault binary.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use docvault::records::{ENTRIES, ENTRY_TEXT_INDEX, INDEXES, USERS};
use docvault::store::{SqliteStore, Store, StoreConfig};
use predicates::prelude::*;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir_str(&self) -> String {
        self.temp_dir.path().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("docvault").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("DOCVAULT_DATA_DIR");
        cmd.env_remove("DOCVAULT_DB_NAME");
        cmd.env_remove("DOCVAULT_TESTING");
        cmd
    }

    fn init(&self, extra: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["init", "--data-dir", &self.data_dir_str()])
            .args(extra)
            .assert()
    }

    fn open(&self, database_name: &str) -> SqliteStore {
        let store = SqliteStore::new(StoreConfig::new(self.data_dir_str(), database_name));
        store.connect().expect("failed to open database");
        store
    }
}

#[test]
fn init_creates_database_with_indexes() {
    let ctx = TestContext::new();

    ctx.init(&[])
        .success()
        .stdout(predicate::str::contains("Database ready at"));

    ctx.temp_dir.child("docvault.db").assert(predicate::path::exists());

    let store = ctx.open("docvault");
    assert_eq!(
        store.get_collection(USERS).unwrap().list_indexes().unwrap(),
        vec!["username_1"]
    );
    assert_eq!(
        store.get_collection(INDEXES).unwrap().list_indexes().unwrap(),
        vec!["owner_id_1_name_1"]
    );
    assert!(
        store
            .get_collection(ENTRIES)
            .unwrap()
            .list_indexes()
            .unwrap()
            .contains(&ENTRY_TEXT_INDEX.to_string())
    );
}

#[test]
fn init_is_idempotent() {
    let ctx = TestContext::new();
    ctx.init(&[]).success();
    ctx.init(&[]).success();
}

#[test]
fn init_honours_database_name() {
    let ctx = TestContext::new();

    ctx.init(&["--database-name", "archive"]).success();

    ctx.temp_dir.child("archive.db").assert(predicate::path::exists());
    ctx.temp_dir.child("docvault.db").assert(predicate::path::missing());
}

#[test]
fn database_name_from_environment() {
    let ctx = TestContext::new();

    ctx.cmd()
        .env("DOCVAULT_DB_NAME", "fromenv")
        .args(["init", "--data-dir", &ctx.data_dir_str()])
        .assert()
        .success();

    ctx.temp_dir.child("fromenv.db").assert(predicate::path::exists());
}

#[test]
fn testing_flag_uses_test_database() {
    let ctx = TestContext::new();

    ctx.init(&["--testing"])
        .success()
        .stdout(predicate::str::contains("docvault_test.db"));

    ctx.temp_dir.child("docvault_test.db").assert(predicate::path::exists());
    ctx.temp_dir.child("docvault.db").assert(predicate::path::missing());
}

#[test]
fn testing_from_environment() {
    let ctx = TestContext::new();

    ctx.cmd()
        .env("DOCVAULT_TESTING", "true")
        .args(["init", "--data-dir", &ctx.data_dir_str()])
        .assert()
        .success();

    ctx.temp_dir.child("docvault_test.db").assert(predicate::path::exists());
}

#[test]
fn unknown_command_fails() {
    let ctx = TestContext::new();
    ctx.cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
