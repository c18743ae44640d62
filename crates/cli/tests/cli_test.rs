use std::io::Write;
use std::process::{Command, Output, Stdio};

struct Cli {
    scope: String,
}

impl Cli {
    fn new() -> Self {
        Self {
            scope: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to execute shmcache")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_shmcache"));
        cmd.args(["--scope", &self.scope, "--namespace", "cli-tests", "--timeout-ms", "5000"])
            .args(args)
            .env_remove("SHMCACHE_CONFIG")
            .env_remove("SHMCACHE_SCOPE")
            .env("SHMCACHE_PERMISSIONS", "0600");
        cmd
    }
}

impl Drop for Cli {
    fn drop(&mut self) {
        let _ = self.run(&["destroy"]);
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_shows_all_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_shmcache"))
        .arg("--help")
        .output()
        .expect("Failed to execute shmcache");
    let text = stdout(&output);
    for command in [
        "set", "get", "has", "remove", "flush", "list", "gc", "locks", "reset-locks", "destroy",
    ] {
        assert!(text.contains(command), "{command} should be listed");
    }
}

#[test]
fn test_set_get_has_remove() {
    let cli = Cli::new();

    assert!(cli.run(&["set", "greeting", "hello"]).status.success());

    let output = cli.run(&["get", "greeting"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello");

    let output = cli.run(&["has", "greeting"]);
    assert_eq!(output.status.code(), Some(0));

    assert!(cli.run(&["remove", "greeting"]).status.success());
    assert_eq!(cli.run(&["get", "greeting"]).status.code(), Some(1));
    assert_eq!(cli.run(&["has", "greeting"]).status.code(), Some(1));
}

#[test]
fn test_set_from_stdin_and_file() {
    let cli = Cli::new();

    let mut child = cli
        .command(&["set", "piped"])
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"\x00binary\xff").unwrap();
    assert!(child.wait().unwrap().success());
    assert_eq!(cli.run(&["get", "piped"]).stdout, b"\x00binary\xff");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"from a file").unwrap();
    let path = file.path().to_str().unwrap().to_string();
    assert!(cli.run(&["set", "filed", "--file", &path]).status.success());
    assert_eq!(stdout(&cli.run(&["get", "filed"])), "from a file");
}

#[test]
fn test_list_and_flush() {
    let cli = Cli::new();
    for id in ["b", "a", "c"] {
        assert!(cli.run(&["set", id, id]).status.success());
    }
    assert_eq!(stdout(&cli.run(&["list"])), "a\nb\nc\n");

    assert!(cli.run(&["flush"]).status.success());
    assert_eq!(stdout(&cli.run(&["list"])), "");
}

#[test]
fn test_locks_json_reports_idle_state() {
    let cli = Cli::new();
    let output = cli.run(&["locks", "--json"]);
    assert!(output.status.success());
    let state: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(state["gate"], 1);
    assert_eq!(state["readers"], 0);
    assert_eq!(state["writers"], 0);

    assert!(cli.run(&["reset-locks"]).status.success());
    assert!(cli.run(&["gc"]).status.success());
}

#[test]
fn test_invalid_identifier_is_rejected() {
    let cli = Cli::new();
    let output = cli.run(&["set", "not valid", "x"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid entry identifier"));
}
