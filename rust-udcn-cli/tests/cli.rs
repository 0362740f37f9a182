use assert_cmd::Command;
use predicates::prelude::*;

fn udcn_pcct() -> Command {
    let mut cmd = Command::cargo_bin("udcn-pcct").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    udcn_pcct()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("disk"));
}

#[test]
fn test_simulate_in_memory() {
    udcn_pcct()
        .args(["simulate", "--names", "20", "--repeat", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulation Results"))
        .stdout(predicate::str::contains("CS hits (memory): 20"));
}

#[test]
fn test_simulate_fifo_eviction() {
    udcn_pcct()
        .args(["simulate", "--names", "20", "--repeat", "2", "--direct-capacity", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("direct entries: 8/8"))
        .stdout(predicate::str::contains("Evictions: direct=32"));
}

#[test]
fn test_simulate_with_disk() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("cs.img");
    udcn_pcct()
        .args(["simulate", "--names", "12", "--repeat", "2", "--direct-capacity", "4"])
        .args(["--disk-slots", "16", "--disk"])
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("CS hits (disk): 8"))
        .stdout(predicate::str::contains("Disk Store"));
}

#[test]
fn test_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    udcn_pcct()
        .args(["disk", "--count", "10", "--path"])
        .arg(dir.path().join("check.img"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Round trips: 10/10 succeeded"));
}

#[test]
fn test_config_file_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pcct.toml");
    std::fs::write(&path, "cs_direct_capacity = 3\n").unwrap();
    udcn_pcct()
        .args(["simulate", "--names", "5", "--repeat", "1", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("direct entries: 3/3"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pcct.toml");
    std::fs::write(&path, "pcct_capacity = 0\n").unwrap();
    udcn_pcct()
        .args(["simulate", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}
