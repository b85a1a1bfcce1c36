use std::process::Command;

const S3LAB_EXE: &str = env!("CARGO_BIN_EXE_s3lab");

#[test]
fn missing_command_fails() {
    let output = Command::new(S3LAB_EXE).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn unknown_command_fails() {
    let output = Command::new(S3LAB_EXE).arg("testLeaks").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn help_lists_pooling_command() {
    let output = Command::new(S3LAB_EXE).arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("testPooling"), "{stdout}");
    assert!(stdout.contains("tests connection pooling"), "{stdout}");
}

#[test]
fn prints_version() {
    let output = Command::new(S3LAB_EXE).arg("version").output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        env!("CARGO_PKG_VERSION")
    );
}

#[test]
fn invalid_config_fails_before_connecting() {
    let output = Command::new(S3LAB_EXE)
        .args(["testPooling", "--concurrency", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("load.concurrency must be at least 1"), "{stderr}");
}
