use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn strata(script: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .arg("--map")
        .arg(demo("harbor.toml"))
        .arg("--settings")
        .arg(demo("settings.toml"))
        .args(["--script", script])
        .output()
        .expect("failed to launch the strata binary")
}

#[test]
fn scripted_walk_reaches_the_shore() {
    let output = strata("U U U U");
    assert!(output.status.success(), "strata exited with {}", output.status);

    let log = String::from_utf8_lossy(&output.stdout);
    assert!(log.contains("walk_finished"), "missing summary in:\n{log}");
    assert!(log.contains("actor_request"));
    assert!(log.contains("presentation"));
}

#[test]
fn unknown_script_glyphs_fail_the_run() {
    let output = strata("U X");
    assert!(!output.status.success());
    let errors = String::from_utf8_lossy(&output.stderr);
    assert!(errors.contains("failed to parse walking script"), "stderr:\n{errors}");
}
