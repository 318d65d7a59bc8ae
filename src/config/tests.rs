use super::settings::{PartialSchedulerSettings, PartialSettings, SchedulerSettings};
use super::{Settings, TargetPolicy, load_config};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.feed.page_size, 5);
    assert_eq!(settings.scheduler.min_interval_ms, 2_000);
    assert_eq!(settings.scheduler.max_interval_ms, 5_000);
    assert_eq!(settings.scheduler.items_per_push, 1);
    assert_eq!(settings.scheduler.policy, TargetPolicy::Single);
}

#[test]
fn partial_scheduler_settings_merge_over_defaults() {
    let partial = PartialSettings {
        scheduler: Some(PartialSchedulerSettings {
            max_interval_ms: Some(9_000),
            policy: Some(TargetPolicy::All),
            ..Default::default()
        }),
        ..Default::default()
    };

    let settings = partial.merge(Settings::default());
    assert_eq!(settings.scheduler.min_interval_ms, 2_000);
    assert_eq!(settings.scheduler.max_interval_ms, 9_000);
    assert_eq!(settings.scheduler.policy, TargetPolicy::All);
    assert_eq!(settings.server.port, 8080);
}

#[test]
fn validate_swaps_reversed_window_and_clamps_push_size() {
    let settings = SchedulerSettings {
        min_interval_ms: 800,
        max_interval_ms: 100,
        items_per_push: 0,
        stop_timeout_ms: 1_000,
        recovery_delay_ms: 100,
        policy: TargetPolicy::Single,
    }
    .validate();

    assert_eq!(settings.min_interval_ms, 100);
    assert_eq!(settings.max_interval_ms, 800);
    assert_eq!(settings.items_per_push, 1);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.* relative to the working directory.
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [catalog]
        path = "fixtures/posts.json"

        [scheduler]
        min_interval_ms = 10
        max_interval_ms = 20
        policy = "all"
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.catalog.path, "fixtures/posts.json");
    assert_eq!(cfg.scheduler.min_interval_ms, 10);
    assert_eq!(cfg.scheduler.max_interval_ms, 20);
    assert_eq!(cfg.scheduler.policy, TargetPolicy::All);
    assert_eq!(cfg.feed.page_size, 5);
}

#[test]
#[serial]
fn load_config_from_environment() {
    temp_env::with_vars(
        [
            ("POPFEED_SERVER__PORT", Some("7070")),
            ("POPFEED_SCHEDULER__ITEMS_PER_PUSH", Some("3")),
            ("POPFEED_LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 7070);
            assert_eq!(cfg.scheduler.items_per_push, 3);
            assert_eq!(cfg.log.level, "debug");
        },
    );
}
