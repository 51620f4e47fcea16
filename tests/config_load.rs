// tests/config_load.rs
//
// Config discovery order and env overrides. Every test touches process-wide
// env / cwd, so they all run serially.

use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use weather_events::config::{AppConfig, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};

const OVERRIDES: &[&str] = &[
    ENV_CONFIG_PATH,
    "SCHEDULER_INTERVAL_SECS",
    "NOTIFY_COOLDOWN_MINUTES",
    "WEATHER_API_URL",
    "TELEGRAM_TOKEN",
    "METRICS_LISTEN",
];

fn clear_env() {
    for k in OVERRIDES {
        std::env::remove_var(k);
    }
}

/// Runs `f` with cwd set to a fresh temp dir, restoring cwd afterwards.
fn in_temp_cwd(f: impl FnOnce(&Path)) {
    let prev = std::env::current_dir().unwrap();
    let dir = TempDir::new().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(dir.path())));
    std::env::set_current_dir(prev).unwrap();
    if let Err(p) = result {
        std::panic::resume_unwind(p);
    }
}

#[test]
#[serial]
fn falls_back_to_defaults_without_any_file() {
    clear_env();
    in_temp_cwd(|_| {
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.scheduler.interval_secs, 3600);
        assert_eq!(cfg.scheduler.lookback_minutes, 60);
        assert_eq!(cfg.notify_log.path, Path::new("state/notifications.jsonl"));
        assert_eq!(cfg.metrics.listen, "0.0.0.0:9100");
        assert!(!cfg.telegram.enabled());
    });
}

#[test]
#[serial]
fn picks_up_default_path_in_cwd() {
    clear_env();
    in_temp_cwd(|dir| {
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(
            dir.join(DEFAULT_CONFIG_PATH),
            "[scheduler]\ninterval_secs = 600\n\n[source]\nbase_url = \"http://station.lan\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.scheduler.interval_secs, 600);
        assert_eq!(cfg.source.base_url, "http://station.lan");
    });
}

#[test]
#[serial]
fn env_path_wins_over_default_path() {
    clear_env();
    in_temp_cwd(|dir| {
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(dir.join(DEFAULT_CONFIG_PATH), "[scheduler]\ninterval_secs = 600\n").unwrap();
        let explicit = dir.join("custom.toml");
        fs::write(&explicit, "[scheduler]\ninterval_secs = 120\n").unwrap();

        std::env::set_var(ENV_CONFIG_PATH, &explicit);
        let cfg = AppConfig::load_default();
        std::env::remove_var(ENV_CONFIG_PATH);

        assert_eq!(cfg.unwrap().scheduler.interval_secs, 120);
    });
}

#[test]
#[serial]
fn env_path_to_missing_file_is_an_error() {
    clear_env();
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = AppConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);

    let err = res.unwrap_err();
    assert!(err.to_string().contains(ENV_CONFIG_PATH));
}

#[test]
#[serial]
fn env_overrides_apply_on_top_of_file() {
    clear_env();
    std::env::set_var("SCHEDULER_INTERVAL_SECS", "900");
    std::env::set_var("NOTIFY_COOLDOWN_MINUTES", "30");
    std::env::set_var("WEATHER_API_URL", " http://10.0.0.5:8080 ");
    std::env::set_var("METRICS_LISTEN", "127.0.0.1:9200");

    let cfg = AppConfig::from_toml_str("[scheduler]\ninterval_secs = 60\n");
    clear_env();

    let cfg = cfg.unwrap();
    assert_eq!(cfg.scheduler.interval_secs, 900);
    assert_eq!(cfg.scheduler.cooldown(), chrono::Duration::minutes(30));
    assert_eq!(cfg.source.base_url, "http://10.0.0.5:8080");
    assert_eq!(cfg.metrics.listen, "127.0.0.1:9200");
}

#[test]
#[serial]
fn unparsable_override_is_ignored() {
    clear_env();
    std::env::set_var("SCHEDULER_INTERVAL_SECS", "soon");
    let cfg = AppConfig::from_toml_str("[scheduler]\ninterval_secs = 60\n");
    clear_env();
    assert_eq!(cfg.unwrap().scheduler.interval_secs, 60);
}

#[test]
#[serial]
fn telegram_env_token_is_resolved() {
    clear_env();
    std::env::set_var("TELEGRAM_TOKEN", "123:abc");
    let cfg = AppConfig::from_toml_str("[telegram]\ntoken = \"ENV\"\n");
    clear_env();

    let cfg = cfg.unwrap();
    assert!(cfg.telegram.enabled());
    assert_eq!(cfg.telegram.token, "123:abc");
}

#[test]
#[serial]
fn telegram_env_token_missing_is_an_error() {
    clear_env();
    let err = AppConfig::from_toml_str("[telegram]\ntoken = \"ENV\"\n").unwrap_err();
    assert!(err.to_string().contains("TELEGRAM_TOKEN"));
}

#[test]
#[serial]
fn zero_interval_is_rejected() {
    clear_env();
    let err = AppConfig::from_toml_str("[scheduler]\ninterval_secs = 0\n").unwrap_err();
    assert!(format!("{err:#}").contains("interval_secs"));
}

#[test]
#[serial]
fn scheduler_section_maps_to_runtime_cfg() {
    clear_env();
    let cfg = AppConfig::from_toml_str(
        "[scheduler]\ninterval_secs = 300\nlookback_minutes = 90\nfetch_timeout_secs = 10\n",
    )
    .unwrap();
    let s = cfg.scheduler.scheduler_cfg();
    assert_eq!(s.interval, std::time::Duration::from_secs(300));
    assert_eq!(s.lookback, chrono::Duration::minutes(90));
    assert_eq!(s.fetch_timeout, std::time::Duration::from_secs(10));
}

#[test]
#[serial]
fn oversized_cooldown_override_is_rejected() {
    clear_env();
    std::env::set_var("NOTIFY_COOLDOWN_MINUTES", i64::MAX.to_string());
    let res = AppConfig::from_toml_str("");
    clear_env();

    let err = res.unwrap_err();
    assert!(format!("{err:#}").contains("cooldown_minutes"), "{err:#}");
}
