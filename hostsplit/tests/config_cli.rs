use assert_cmd::Command;
use std::env;
use std::fs;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("hostsplit-cli-{}-{}", name, std::process::id()))
}

fn hostsplit() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

#[test]
fn check_prints_the_effective_rules() {
    let config = temp_path("check-ok.toml");
    fs::write(
        &config,
        r#"[[domains]]
name = "example.com"

[[domains]]
name = "api.net"
include_subdomains = false

[domains.https]
enabled = false
"#,
    )
    .unwrap();

    let output = hostsplit()
        .arg("-c")
        .arg(&config)
        .arg("check")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 rules"));
    assert!(stdout.contains("example.com (example.com, *.example.com)"));
    assert!(stdout.contains("api.net (api.net)"));
    assert!(stdout.contains("disabled"));

    let _ = fs::remove_file(&config);
}

#[test]
fn check_rejects_a_broken_configuration() {
    let config = temp_path("check-bad.toml");
    fs::write(&config, "domains = \"not an array\"\n").unwrap();

    let output = hostsplit()
        .arg("-c")
        .arg(&config)
        .arg("check")
        .output()
        .unwrap();
    assert!(!output.status.success());

    let _ = fs::remove_file(&config);
}

#[test]
fn check_fails_when_the_file_is_missing() {
    let config = temp_path("check-missing.toml");
    let _ = fs::remove_file(&config);

    let output = hostsplit()
        .arg("-c")
        .arg(&config)
        .arg("check")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn init_writes_defaults_and_refuses_to_overwrite() {
    let config = temp_path("init.toml");
    let _ = fs::remove_file(&config);

    let output = hostsplit()
        .arg("-c")
        .arg(&config)
        .arg("init")
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = fs::read_to_string(&config).unwrap();
    assert!(text.contains("[global]"));

    let output = hostsplit()
        .arg("-c")
        .arg(&config)
        .arg("init")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_eq!(fs::read_to_string(&config).unwrap(), text);

    let _ = fs::remove_file(&config);
}
