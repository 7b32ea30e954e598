// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear_hearth_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("HEARTH_") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn defaults_apply_without_env() {
    clear_hearth_env();
    let env = DaemonEnv::load();
    assert!(env.data_dir.ends_with("hearth"));
    assert_eq!(env.rclone_binary, "rclone");
    assert_eq!(env.rclone_timeout, Duration::from_secs(300));
    assert!(!env.rclone_verbose);
    assert_eq!(env.activity_max_events, 1_000);
    assert!(env.workloads_dir.is_none());
}

#[test]
#[serial]
fn env_overrides_apply() {
    clear_hearth_env();
    std::env::set_var("HEARTH_DATA_DIR", "/tmp/hearth-test");
    std::env::set_var("HEARTH_WORKLOADS_DIR", "/tmp/workloads");
    std::env::set_var("HEARTH_WORKLOADS_POLL_INTERVAL", "3s");
    std::env::set_var("HEARTH_RCLONE_BIN", "/opt/bin/rclone");
    std::env::set_var("HEARTH_RCLONE_TIMEOUT", "2m");
    std::env::set_var("HEARTH_RCLONE_VERBOSE", "true");
    std::env::set_var("HEARTH_ACTIVITY_MAX_EVENTS", "50");
    std::env::set_var("HEARTH_REAPER_POLL_INTERVAL", "500ms");
    std::env::set_var("HEARTH_DEFAULT_CPU_SHARES", "1024");
    std::env::set_var("HEARTH_DEFAULT_MEMORY", "2g");

    let env = DaemonEnv::load();
    assert_eq!(env.data_dir, PathBuf::from("/tmp/hearth-test"));
    assert_eq!(env.workloads_dir, Some(PathBuf::from("/tmp/workloads")));
    assert_eq!(env.workloads_poll_interval, Duration::from_secs(3));
    assert_eq!(env.rclone_binary, "/opt/bin/rclone");
    assert_eq!(env.rclone_timeout, Duration::from_secs(120));
    assert!(env.rclone_verbose);
    assert_eq!(env.activity_max_events, 50);
    assert_eq!(env.reaper_poll_interval, Duration::from_millis(500));
    assert_eq!(env.default_cpu_shares, Some(1024));
    assert_eq!(env.default_memory, Some("2g".to_string()));

    assert_eq!(env.store_path(), PathBuf::from("/tmp/hearth-test/hearth.db"));
    assert_eq!(env.lock_path(), PathBuf::from("/tmp/hearth-test/hearthd.lock"));
    clear_hearth_env();
}

#[test]
#[serial]
fn unparsable_values_fall_back() {
    clear_hearth_env();
    std::env::set_var("HEARTH_RCLONE_TIMEOUT", "soon");
    std::env::set_var("HEARTH_ACTIVITY_MAX_EVENTS", "many");
    std::env::set_var("HEARTH_RCLONE_VERBOSE", "maybe");

    let env = DaemonEnv::load();
    assert_eq!(env.rclone_timeout, Duration::from_secs(300));
    assert_eq!(env.activity_max_events, 1_000);
    assert!(!env.rclone_verbose);
    clear_hearth_env();
}
