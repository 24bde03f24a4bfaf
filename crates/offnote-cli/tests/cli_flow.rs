use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_offnote"))
}

struct Env {
    root: TempDir,
}

impl Env {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(root.path().join("c")).expect("create config dir");
        std::fs::create_dir_all(root.path().join("d")).expect("create data dir");
        Self { root }
    }

    fn db(&self) -> PathBuf {
        self.root.path().join("d").join("offnote").join("offnote.db")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn config_file(&self) -> PathBuf {
        self.root.path().join("c").join("offnote").join("config.toml")
    }

    fn command(&self, user: &str) -> Command {
        let mut cmd = Command::new(bin());
        cmd.env("XDG_CONFIG_HOME", self.root.path().join("c"))
            .env("XDG_DATA_HOME", self.root.path().join("d"))
            .env("HOME", self.root.path())
            .env("OFFNOTE_USER", user)
            .env_remove("OFFNOTE_DB")
            .env_remove("OFFNOTE_CONFIG")
            .env_remove("OFFNOTE_PASSPHRASE")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, user: &str, args: &[&str]) -> Output {
        self.command(user).args(args).output().expect("run offnote")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed\nstdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

fn note_ids(env: &Env, user: &str) -> Vec<String> {
    let output = env.run(user, &["notes", "list", "--json"]);
    assert_success(&output);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|note| note["id"].as_str().expect("id").to_string())
        .collect()
}

#[test]
fn test_init_writes_config_once() {
    let env = Env::new();

    let output = env.run("alice", &["init", "--origin", "http://localhost:3000"]);
    assert_success(&output);
    let config = std::fs::read_to_string(env.config_file()).expect("config written");
    assert!(config.contains("[storage]"));
    assert!(config.contains("http://localhost:3000"));
    assert!(env.db().exists());

    let again = env.run("alice", &["init"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));

    assert_success(&env.run("alice", &["init", "--force"]));
}

#[test]
fn test_notes_round_trip() {
    let env = Env::new();
    assert_success(&env.run("alice", &["init"]));

    assert_success(&env.run(
        "alice",
        &["notes", "add", "--id", "n1", "--title", "Groceries", "--content", "eggs", "--tag", "home"],
    ));
    assert_success(&env.run(
        "alice",
        &["notes", "add", "--id", "n2", "--title", "Ideas", "--content", "offline"],
    ));
    assert_eq!(note_ids(&env, "alice"), vec!["n2", "n1"]);

    let show = env.run("alice", &["notes", "show", "n1", "--json"]);
    assert_success(&show);
    let note: serde_json::Value = serde_json::from_slice(&show.stdout).expect("json");
    assert_eq!(note["title"], "Groceries");
    assert_eq!(note["tags"], serde_json::json!(["home"]));

    assert_success(&env.run("alice", &["notes", "delete", "n1"]));
    assert_eq!(note_ids(&env, "alice"), vec!["n2"]);

    let missing = env.run("alice", &["notes", "show", "n1"]);
    assert!(!missing.status.success());
    assert!(stderr(&missing).contains("Note not found"));
}

#[test]
fn test_mirror_is_encrypted_and_per_user() {
    let env = Env::new();
    assert_success(&env.run("alice", &["init"]));
    assert_success(&env.run(
        "alice",
        &["notes", "add", "--id", "n1", "--title", "SecretTitle", "--content", "x"],
    ));

    let raw = std::fs::read(env.db()).expect("read db");
    assert!(!raw.windows(11).any(|w| w == b"SecretTitle"));

    assert!(note_ids(&env, "bob").is_empty());
    assert_eq!(note_ids(&env, "alice"), vec!["n1"]);
}

#[test]
fn test_last_sync_and_forget() {
    let env = Env::new();
    assert_success(&env.run("alice", &["init"]));

    let before = env.run("alice", &["notes", "last-sync"]);
    assert_success(&before);
    assert_eq!(stdout(&before).trim(), "never");

    assert_success(&env.run("alice", &["notes", "add", "--title", "T", "--content", "c"]));
    let after = env.run("alice", &["notes", "last-sync", "--json"]);
    assert_success(&after);
    let value: serde_json::Value = serde_json::from_slice(&after.stdout).expect("json");
    assert_eq!(value["never"], false);

    assert_success(&env.run("alice", &["notes", "forget"]));
    assert!(note_ids(&env, "alice").is_empty());
    let forgotten = env.run("alice", &["notes", "last-sync"]);
    assert_eq!(stdout(&forgotten).trim(), "never");
}

#[test]
fn test_backup_export_import() {
    let env = Env::new();
    assert_success(&env.run("alice", &["init"]));
    assert_success(&env.run(
        "alice",
        &["notes", "add", "--id", "n1", "--title", "Keep me", "--content", "c"],
    ));
    let backup = env.path("notes.age");
    let backup_arg = backup.to_str().expect("utf-8 path");

    let export = env
        .command("alice")
        .env("OFFNOTE_PASSPHRASE", "correct horse battery")
        .args(["backup", "export", backup_arg])
        .output()
        .expect("run export");
    assert_success(&export);
    assert!(backup.exists());

    let wrong = env
        .command("bob")
        .env("OFFNOTE_PASSPHRASE", "wrong passphrase!")
        .args(["backup", "import", backup_arg])
        .output()
        .expect("run import");
    assert!(!wrong.status.success());
    assert!(stderr(&wrong).contains("Incorrect passphrase"));

    let import = env
        .command("bob")
        .env("OFFNOTE_PASSPHRASE", "correct horse battery")
        .args(["backup", "import", backup_arg])
        .output()
        .expect("run import");
    assert_success(&import);
    assert_eq!(note_ids(&env, "bob"), vec!["n1"]);
}

#[test]
fn test_backup_requires_passphrase_without_tty() {
    let env = Env::new();
    assert_success(&env.run("alice", &["init"]));
    let output = env.run("alice", &["backup", "export", env.path("x.age").to_str().expect("utf-8")]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("OFFNOTE_PASSPHRASE"));
}

#[test]
fn test_cache_install_and_clear_without_shell() {
    let env = Env::new();
    assert_success(&env.run("alice", &["init"]));

    let empty = env.run("alice", &["cache", "generations", "--json"]);
    assert_success(&empty);
    assert_eq!(stdout(&empty).trim(), "[]");

    let install = env.run("alice", &["cache", "install"]);
    assert_success(&install);
    assert!(stdout(&install).contains("Activated offnote-cache-"));

    let listed = env.run("alice", &["cache", "generations"]);
    assert_success(&listed);
    assert_eq!(stdout(&listed).lines().count(), 1);

    let clear = env.run("alice", &["cache", "message", r#"{"type":"CLEAR_CACHE"}"#]);
    assert_success(&clear);
    assert!(stdout(&clear).contains("Cleared 1"));

    let bogus = env.run("alice", &["cache", "message", r#"{"type":"REBOOT"}"#]);
    assert!(!bogus.status.success());
}

#[test]
fn test_explicit_db_flag_without_config() {
    let env = Env::new();
    let db = env.path("elsewhere.db");
    let db_arg = db.to_str().expect("utf-8");

    assert_success(&env.run(
        "alice",
        &["--db", db_arg, "notes", "add", "--id", "n1", "--title", "T", "--content", "c"],
    ));

    assert!(db.exists());
    assert!(!env.db().exists());
}

#[test]
fn test_completions() {
    let env = Env::new();
    let output = env.run("alice", &["completions", "bash"]);
    assert_success(&output);
    assert!(stdout(&output).contains("offnote"));
}
