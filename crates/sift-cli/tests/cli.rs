use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;

struct Env {
    temp: TempDir,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("config")).expect("config dir");
        Self { temp }
    }

    fn db_path(&self) -> PathBuf {
        self.temp.path().join("sift.sqlite3")
    }

    fn config_home(&self) -> PathBuf {
        self.temp.path().join("config")
    }

    fn output(&self, args: &[&str], stdin: Option<&str>) -> Output {
        let db_path = self.db_path();
        let mut cmd = cargo_bin_cmd!("sift");
        cmd.env("XDG_CONFIG_HOME", self.config_home())
            .env_remove("RUST_LOG")
            .args(["--db-path", db_path.to_str().expect("db path")])
            .args(args);
        if let Some(input) = stdin {
            cmd.write_stdin(input);
        }
        cmd.output().expect("run command")
    }

    fn run(&self, args: &[&str]) -> String {
        let output = self.output(args, None);
        assert!(output.status.success(), "command failed: {:?}", output);
        String::from_utf8(output.stdout).expect("utf8")
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.output(&full, None);
        assert!(output.status.success(), "command failed: {:?}", output);
        serde_json::from_slice(&output.stdout).expect("parse json")
    }

    fn count(&self, filter: &[&str]) -> u64 {
        let mut args = vec!["count"];
        args.extend_from_slice(filter);
        let value = self.run_json(&args);
        value["count"].as_u64().expect("count")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.config_home().join("sift");
        fs::create_dir_all(&dir).expect("sift config dir");
        let path = dir.join("config.toml");
        fs::write(&path, contents).expect("write config");
        restrict_permissions(&path);
    }
}

fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms).expect("chmod");
    }
}

fn seed(env: &Env) {
    env.run(&["add", "Pay", "rent", "project:Home", "+bills"]);
    env.run(&["add", "Write", "report", "project:Work", "priority:H"]);
    env.run(&["add", "Water", "plants", "project:Home", "due:2030-01-01"]);
}

fn descriptions(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|task| {
            task["attributes"]["description"]
                .as_str()
                .expect("description")
                .to_string()
        })
        .collect()
}

#[test]
fn add_then_list_and_count_with_filters() {
    let env = Env::new();
    seed(&env);

    let all = env.run_json(&["list"]);
    assert_eq!(
        descriptions(&all),
        vec!["Pay rent", "Write report", "Water plants"]
    );
    assert_eq!(all[0]["id"], 1);

    assert_eq!(env.count(&["project:Home"]), 2);
    assert_eq!(env.count(&["+bills"]), 1);
    assert_eq!(env.count(&["-bills"]), 2);
    assert_eq!(env.count(&["2"]), 1);
    assert_eq!(env.count(&["1", "3"]), 2);
    assert_eq!(env.count(&["project:Home", "or", "priority:H"]), 3);
    assert_eq!(env.count(&["due.before:2031-01-01"]), 1);
    assert_eq!(env.count(&["report"]), 1);

    let text = env.run(&["list", "project:Work"]);
    assert!(text.contains("Write report"));
    assert!(!text.contains("Pay rent"));
}

#[test]
fn done_moves_tasks_out_of_the_pending_list() {
    let env = Env::new();
    seed(&env);

    let out = env.run(&["done", "1"]);
    assert!(out.contains("completed task 1 'Pay rent'"));

    assert_eq!(env.count(&["status:pending"]), 2);
    assert_eq!(env.count(&["status:completed"]), 1);
    assert_eq!(env.count(&[]), 3);

    let pending = env.run_json(&["list", "status:pending"]);
    assert_eq!(descriptions(&pending), vec!["Write report", "Water plants"]);
    assert_eq!(pending[0]["id"], 1);

    env.run(&["delete", "project:Work"]);
    assert_eq!(env.count(&["status:deleted"]), 1);
}

#[test]
fn unfiltered_done_is_refused_without_confirmation() {
    let env = Env::new();
    seed(&env);

    let output = env.output(&["done"], None);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("refusing"));
    assert_eq!(env.count(&["status:pending"]), 3);

    let output = env.output(&["done"], Some("y\n"));
    assert!(output.status.success(), "command failed: {:?}", output);
    assert_eq!(env.count(&["status:completed"]), 3);
}

#[test]
fn confirmation_off_refuses_without_prompting() {
    let env = Env::new();
    env.write_config("confirmation = false\n");
    seed(&env);

    let output = env.output(&["delete"], Some("y\n"));
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(env.count(&["status:deleted"]), 0);
}

#[test]
fn bad_filters_are_invalid_input() {
    let env = Env::new();
    seed(&env);

    let output = env.output(&["--verbose", "list", "nosuchfield", "==", "1"], None);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("nosuchfield"));

    let output = env.output(&["list", "(", "project:Home"], None);
    assert_eq!(output.status.code(), Some(3));

    let output = env.output(&["list", "project.sortof:Home"], None);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn legacy_verification_does_not_change_results() {
    let env = Env::new();
    env.write_config("[filter]\nverify_legacy = true\n");
    seed(&env);

    assert_eq!(env.count(&["project:Home", "+bills"]), 1);
    assert_eq!(env.count(&["project.not:Home"]), 1);
}

#[test]
fn add_requires_a_description() {
    let env = Env::new();
    let output = env.output(&["add", "+bills"], None);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn completions_emit_a_script() {
    let env = Env::new();
    let out = env.run(&["completions", "bash"]);
    assert!(out.contains("sift"));
}

#[test]
fn id_arithmetic_is_rejected_before_anything_changes() {
    let env = Env::new();
    seed(&env);

    let output = env.output(&["done", "1", "-", "2"], Some("y\n"));
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(env.count(&["status:pending"]), 3);

    let output = env.output(&["delete", "3", "+", "1"], Some("y\n"));
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(env.count(&["status:deleted"]), 0);
}
