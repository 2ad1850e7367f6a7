use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lflag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lflag");
    path
}

struct Env {
    _tmp: TempDir,
    root: PathBuf,
    config: PathBuf,
}

impl Env {
    fn file(&self, name: &str) -> PathBuf {
        self.root.join("files").join(name)
    }
}

fn setup_test_env() -> Env {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    fs::write(
        files_dir.join("main.py"),
        "import os\n\ndef main():\n    # TODO: parse args\n    run()\n\nif __name__ == \"__main__\":\n    main()  # todo later\n",
    )
    .unwrap();
    fs::write(files_dir.join("notes.txt"), "one\ntwo\nthree\n").unwrap();

    let config_content = format!(
        r#"[store]
path = "{}/data/lineflags.sqlite"

[search]
viewport_lines = 2
"#,
        root.display()
    );
    let config = config_dir.join("lineflags.toml");
    fs::write(&config, config_content).unwrap();

    Env {
        _tmp: tmp,
        root,
        config,
    }
}

fn run_lflag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lflag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lflag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn add(env: &Env, file: &Path, line: &str, tone: &str) {
    let (stdout, stderr, success) = run_lflag(
        &env.config,
        &["add", file.to_str().unwrap(), "--line", line, "--tone", tone],
    );
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env();

    let (stdout, stderr, success) = run_lflag(&env.config, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_lflag(&env.config, &["init"]);
    assert!(success, "Second init failed (not idempotent)");
    assert!(env.root.join("data/lineflags.sqlite").exists());
}

#[test]
fn test_tones_prints_catalog_without_config() {
    let (stdout, _, success) = run_lflag(Path::new("/nonexistent/lineflags.toml"), &["tones"]);
    assert!(success);
    for name in ["Piano1", "Violin2", "Guitar3", "Marimba1"] {
        assert!(stdout.contains(name), "missing {} in {}", name, stdout);
    }
}

#[test]
fn test_missing_config_fails() {
    let (_, stderr, success) = run_lflag(Path::new("/nonexistent/lineflags.toml"), &["init"]);
    assert!(!success);
    assert!(!stderr.is_empty());
}

#[test]
fn test_add_then_list() {
    let env = setup_test_env();
    let file = env.file("main.py");
    let path = file.to_str().unwrap();

    let (stdout, _, success) = run_lflag(
        &env.config,
        &["add", path, "--line", "3", "--tone", "Violin2"],
    );
    assert!(success);
    assert!(stdout.contains("added Violin2 flag on line 3"), "{}", stdout);

    let (stdout, _, success) = run_lflag(&env.config, &["list", path]);
    assert!(success);
    assert!(stdout.contains("Violin2"));
    assert!(stdout.contains("def main():"));
}

#[test]
fn test_add_rejects_duplicates() {
    let env = setup_test_env();
    let file = env.file("main.py");
    add(&env, &file, "3", "Piano1");

    let (_, stderr, success) = run_lflag(
        &env.config,
        &["add", file.to_str().unwrap(), "--line", "3", "--tone", "Piano2"],
    );
    assert!(!success);
    assert!(stderr.contains("already exists"), "{}", stderr);

    let (_, stderr, success) = run_lflag(
        &env.config,
        &["add", file.to_str().unwrap(), "--line", "5", "--tone", "Piano1"],
    );
    // A tone already in use is never offered, so the request goes unanswered.
    assert!(success, "{}", stderr);
    let (stdout, _, _) = run_lflag(&env.config, &["list", file.to_str().unwrap()]);
    assert_eq!(stdout.matches("Piano").count(), 1, "{}", stdout);
}

#[test]
fn test_add_without_tone_is_cancelled() {
    let env = setup_test_env();
    let file = env.file("notes.txt");

    // stdin is not a terminal, so there is nobody to ask.
    let (stdout, _, success) =
        run_lflag(&env.config, &["add", file.to_str().unwrap(), "--line", "1"]);
    assert!(success);
    assert!(stdout.contains("cancelled"), "{}", stdout);

    let (stdout, _, _) = run_lflag(&env.config, &["list", file.to_str().unwrap()]);
    assert!(stdout.contains("No flags"));
}

#[test]
fn test_zero_line_is_rejected() {
    let env = setup_test_env();
    let file = env.file("notes.txt");
    let (_, stderr, success) = run_lflag(
        &env.config,
        &["add", file.to_str().unwrap(), "--line", "0", "--tone", "Piano1"],
    );
    assert!(!success);
    assert!(stderr.contains("start at 1"));
}

#[test]
fn test_delete() {
    let env = setup_test_env();
    let file = env.file("notes.txt");
    let path = file.to_str().unwrap();
    add(&env, &file, "2", "Guitar1");

    let (_, stderr, success) = run_lflag(&env.config, &["delete", path, "--line", "1"]);
    assert!(!success);
    assert!(stderr.contains("no matching flag"));

    let (stdout, _, success) = run_lflag(&env.config, &["delete", path, "--line", "2"]);
    assert!(success);
    assert!(stdout.contains("deleted Guitar1"));

    let (stdout, _, _) = run_lflag(&env.config, &["list", path]);
    assert!(stdout.contains("No flags"));
}

#[test]
fn test_next_wraps_around() {
    let env = setup_test_env();
    let file = env.file("main.py");
    let path = file.to_str().unwrap();
    add(&env, &file, "3", "Piano1");
    add(&env, &file, "7", "Piano2");

    let (stdout, _, success) = run_lflag(&env.config, &["next", path, "--line", "4"]);
    assert!(success);
    assert!(stdout.contains("moved to flag on line 7"), "{}", stdout);

    let (stdout, _, _) = run_lflag(&env.config, &["next", path, "--line", "7"]);
    assert!(stdout.contains("moved to flag on line 3"), "{}", stdout);
    // End of "def main():"
    assert!(stdout.contains("cursor: line 3, column 12"), "{}", stdout);
}

#[test]
fn test_next_with_query() {
    let env = setup_test_env();
    let file = env.file("main.py");
    let path = file.to_str().unwrap();
    add(&env, &file, "3", "Piano1");
    add(&env, &file, "4", "Piano2");
    add(&env, &file, "8", "Piano3");

    let (stdout, stderr, success) =
        run_lflag(&env.config, &["next", path, "--line", "4", "--query", "todo"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("moved to flag on line 8"), "{}", stdout);

    let (stdout, _, _) = run_lflag(&env.config, &["next", path, "--line", "8", "--query", "todo"]);
    assert!(stdout.contains("moved to flag on line 4"), "{}", stdout);
}

#[test]
fn test_search_flagged_lines() {
    let env = setup_test_env();
    let file = env.file("main.py");
    let path = file.to_str().unwrap();
    add(&env, &file, "4", "Piano1");
    add(&env, &file, "8", "Piano2");

    // A two-line viewport around line 1 shows neither match.
    let (stdout, stderr, success) =
        run_lflag(&env.config, &["search", path, "TODO", "--line", "1"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("2 match(es), moved to line 4"), "{}", stdout);
    assert!(stdout.contains("4:7-11"), "{}", stdout);
    assert!(stdout.contains("8:15-19"), "{}", stdout);

    let (stdout, _, success) = run_lflag(&env.config, &["search", path, "import", "--line", "1"]);
    assert!(success);
    assert!(stdout.contains("no flagged line matches"), "{}", stdout);
}

#[test]
fn test_search_without_flags_fails() {
    let env = setup_test_env();
    let file = env.file("notes.txt");
    let (_, stderr, success) =
        run_lflag(&env.config, &["search", file.to_str().unwrap(), "one"]);
    assert!(!success);
    assert!(stderr.contains("no matching flag"));
}

#[test]
fn test_sync_after_external_edit() {
    let env = setup_test_env();
    let file = env.file("notes.txt");
    let path = file.to_str().unwrap();
    add(&env, &file, "1", "Piano1");
    add(&env, &file, "3", "Violin1");

    // Two lines inserted above "two".
    fs::write(&file, "one\nnew a\nnew b\ntwo\nthree\n").unwrap();
    let (stdout, stderr, success) = run_lflag(&env.config, &["sync", path, "--start", "2"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("shifted 1 flag(s) by 2"), "{}", stdout);

    let (stdout, _, _) = run_lflag(&env.config, &["list", path]);
    let lines: Vec<&str> = stdout.lines().skip(1).collect();
    assert_eq!(lines.len(), 2, "{}", stdout);
    assert!(lines[0].starts_with("1 ") && lines[0].contains("Piano1"));
    assert!(lines[1].starts_with("5 ") && lines[1].contains("three"));

    let (stdout, _, _) = run_lflag(&env.config, &["sync", path, "--start", "2"]);
    assert!(stdout.contains("No changes"));
}

#[test]
fn test_cue() {
    let env = setup_test_env();
    let file = env.file("main.py");
    let path = file.to_str().unwrap();
    add(&env, &file, "3", "Guitar2");

    let (stdout, _, success) = run_lflag(&env.config, &["cue", path, "--line", "3"]);
    assert!(success);
    assert!(stdout.contains("played F4 (program 24)"), "{}", stdout);

    let (stdout, _, _) = run_lflag(
        &env.config,
        &["cue", path, "--line", "8", "--context", "if statement"],
    );
    assert!(stdout.contains("played g#3 (program 0)"), "{}", stdout);
}

#[test]
fn test_gc_removes_flags_of_deleted_files() {
    let env = setup_test_env();
    let kept = env.file("main.py");
    let gone = env.file("notes.txt");
    add(&env, &kept, "1", "Piano1");
    add(&env, &gone, "1", "Piano1");

    fs::remove_file(&gone).unwrap();
    let (stdout, stderr, success) = run_lflag(&env.config, &["gc"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("1 remaining"), "{}", stdout);

    let (stdout, _, _) = run_lflag(&env.config, &["list", kept.to_str().unwrap()]);
    assert!(stdout.contains("Piano1"));
}

#[test]
fn test_add_past_end_of_file_fails() {
    let env = setup_test_env();
    let file = env.file("notes.txt");
    let path = file.to_str().unwrap();

    let (_, stderr, success) = run_lflag(
        &env.config,
        &["add", path, "--line", "100", "--tone", "Piano1"],
    );
    assert!(!success);
    assert!(stderr.contains("past the end"), "{}", stderr);

    // One past the last line is also out of range.
    let (_, _, success) = run_lflag(
        &env.config,
        &["add", path, "--line", "4", "--tone", "Piano1"],
    );
    assert!(!success);

    let (stdout, _, _) = run_lflag(&env.config, &["list", path]);
    assert!(stdout.contains("No flags"), "{}", stdout);
}

#[test]
fn test_any_command_collects_flags_of_deleted_files() {
    let env = setup_test_env();
    let kept = env.file("main.py");
    let gone = env.file("notes.txt");
    add(&env, &kept, "1", "Piano1");
    add(&env, &gone, "1", "Piano1");

    fs::remove_file(&gone).unwrap();
    // Collection runs as part of an unrelated command...
    let (_, stderr, success) = run_lflag(&env.config, &["list", kept.to_str().unwrap()]);
    assert!(success, "{}", stderr);

    // ...so there is nothing left for an explicit run to remove.
    let (stdout, _, success) = run_lflag(&env.config, &["gc"]);
    assert!(success);
    assert!(stdout.contains("removed 0 record(s), 1 remaining"), "{}", stdout);
}
