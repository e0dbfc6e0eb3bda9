//! Driver integration tests.
//!
//! These run the built `wiretap` binary end to end with stand-in shim and
//! relay files, so they exercise argument parsing, environment assembly and
//! exit-code propagation without needing a loadable shim library.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn wiretap() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wiretap"))
}

/// A scratch directory with stand-in shim/relay files the driver can find.
struct Scratch {
    dir: PathBuf,
    library: PathBuf,
    reporter: PathBuf,
}

impl Scratch {
    fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("wiretap-driver-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let library = dir.join("libwiretap_shim.so");
        let reporter = dir.join("wiretap-relay");
        fs::write(&library, b"").unwrap();
        fs::write(&reporter, b"").unwrap();
        Self {
            dir,
            library,
            reporter,
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

#[test]
fn propagates_the_build_exit_code() {
    let scratch = Scratch::new("exit-code");
    let status = wiretap()
        .arg("--library")
        .arg(&scratch.library)
        .arg("--reporter")
        .arg(&scratch.reporter)
        .arg("--output")
        .arg(scratch.dir.join("out.report"))
        .args(["sh", "-c", "exit 3"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(3));
}

#[test]
fn succeeding_build_exits_zero() {
    let scratch = Scratch::new("success");
    let status = wiretap()
        .arg("--library")
        .arg(&scratch.library)
        .arg("--reporter")
        .arg(&scratch.reporter)
        .arg("--output")
        .arg(scratch.dir.join("out.report"))
        .arg("true")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));
}

#[test]
fn session_variables_reach_the_build() {
    let scratch = Scratch::new("session-env");
    let report = scratch.dir.join("out.report");
    let captured = scratch.dir.join("env.txt");
    let output = wiretap()
        .arg("--library")
        .arg(&scratch.library)
        .arg("--reporter")
        .arg(&scratch.reporter)
        .arg("--output")
        .arg(&report)
        .args([
            "sh",
            "-c",
            &format!("env | grep ^INTERCEPT_ > {}", captured.display()),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let env = fs::read_to_string(&captured).unwrap();
    assert!(env.contains(&format!(
        "INTERCEPT_REPORT_DESTINATION={}",
        report.display()
    )));
    assert!(env.contains(&format!(
        "INTERCEPT_SESSION_LIBRARY={}",
        scratch.library.display()
    )));
    assert!(env.contains(&format!(
        "INTERCEPT_REPORT_COMMAND={}",
        scratch.reporter.display()
    )));
    assert!(!env.contains("INTERCEPT_VERBOSE"));
}

#[test]
fn verbose_flag_is_forwarded_to_the_session() {
    let scratch = Scratch::new("verbose");
    let captured = scratch.dir.join("env.txt");
    let output = wiretap()
        .arg("--verbose")
        .arg("--library")
        .arg(&scratch.library)
        .arg("--reporter")
        .arg(&scratch.reporter)
        .arg("--output")
        .arg(scratch.dir.join("out.report"))
        .args([
            "sh",
            "-c",
            &format!("env | grep ^INTERCEPT_VERBOSE > {}", captured.display()),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(&captured).unwrap().trim(),
        "INTERCEPT_VERBOSE=true"
    );
}

#[test]
fn rejects_a_missing_build_command() {
    let scratch = Scratch::new("no-command");
    let output = wiretap()
        .arg("--library")
        .arg(&scratch.library)
        .arg("--reporter")
        .arg(&scratch.reporter)
        .output()
        .unwrap();
    assert!(!output.status.success());
}
