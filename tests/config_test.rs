use std::time::Duration;

use workpool::Error;
use workpool::config::{Config, PoolConfig, ShutdownMode};

const VARS: &[&str] = &[
    "WORKPOOL_WORKERS",
    "WORKPOOL_QUEUE_CAPACITY",
    "WORKPOOL_TASK_TIMEOUT_MS",
    "WORKPOOL_SHUTDOWN_TIMEOUT_MS",
    "WORKPOOL_SHUTDOWN_MODE",
];

fn clear_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

// Environment variables are process-global, so every env case lives in
// one test to keep them from racing each other.
#[test]
fn config_from_env() {
    clear_env();
    let config = Config::from_env().unwrap();
    assert_eq!(config.pool, PoolConfig::default());
    assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("WORKPOOL_WORKERS", "3");
        std::env::set_var("WORKPOOL_QUEUE_CAPACITY", "5");
        std::env::set_var("WORKPOOL_TASK_TIMEOUT_MS", "250");
        std::env::set_var("WORKPOOL_SHUTDOWN_TIMEOUT_MS", "2000");
        std::env::set_var("WORKPOOL_SHUTDOWN_MODE", "cancel");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.pool.workers, 3);
    assert_eq!(config.pool.queue_capacity, 5);
    assert_eq!(config.pool.task_timeout, Some(Duration::from_millis(250)));
    assert_eq!(config.pool.shutdown_mode, ShutdownMode::Cancel);
    assert_eq!(config.shutdown_timeout, Duration::from_secs(2));

    unsafe { std::env::set_var("WORKPOOL_WORKERS", "many") };
    assert!(Config::from_env().is_err());

    unsafe { std::env::set_var("WORKPOOL_WORKERS", "0") };
    assert!(Config::from_env().is_err());

    unsafe { std::env::set_var("WORKPOOL_WORKERS", "2") };
    unsafe { std::env::set_var("WORKPOOL_SHUTDOWN_MODE", "abort") };
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn config_from_toml_overrides_defaults() {
    let config = Config::from_toml_str(
        r#"
        shutdown_timeout_ms = 1500
        log_level = "debug"

        [pool]
        workers = 2
        queue_capacity = 10
        task_timeout_ms = 100
        shutdown_mode = "cancel"
        "#,
    )
    .unwrap();

    assert_eq!(
        config.pool,
        PoolConfig::new(2, 10)
            .task_timeout(Duration::from_millis(100))
            .shutdown_mode(ShutdownMode::Cancel)
    );
    assert_eq!(config.shutdown_timeout, Duration::from_millis(1500));
    assert_eq!(config.log_level, "debug");
    assert!(config.otel_endpoint.is_none());
}

#[test]
fn config_from_empty_toml_is_default() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.pool, PoolConfig::default());
    assert_eq!(config.log_level, "info");
}

#[test]
fn config_from_toml_rejects_bad_values() {
    assert!(Config::from_toml_str("[pool]\nworkers = 0\n").is_err());
    assert!(Config::from_toml_str("[pool]\nshutdown_mode = \"later\"\n").is_err());
    assert!(Config::from_toml_str("[pool]\nworkers = \"two\"\n").is_err());
}

#[test]
fn config_from_missing_file_fails() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/workpool.toml"));
    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("/nonexistent/workpool.toml")),
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn shutdown_mode_parses() {
    assert_eq!("drain".parse::<ShutdownMode>().unwrap(), ShutdownMode::Drain);
    assert_eq!("cancel".parse::<ShutdownMode>().unwrap(), ShutdownMode::Cancel);
    assert!("stop".parse::<ShutdownMode>().is_err());
    assert_eq!(ShutdownMode::default(), ShutdownMode::Drain);
}
