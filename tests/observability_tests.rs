mod common;

use bank_ledger::observability::{
    get_metrics, init_metrics, mask_amount, mask_sensitive, render_metrics, LatencyTimer,
    LogConfig, LogFormat,
};
use common::{transfer_request, TestLedger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn test_log_config_default() {
    let config = LogConfig::default();
    assert_eq!(config.level, "info");
    assert_eq!(config.format, LogFormat::Pretty);
    assert!(config.include_target);
    assert!(!config.include_file);
    assert!(!config.include_line);
}

#[test]
fn test_log_config_new() {
    let config = LogConfig::new("debug", LogFormat::from("json"));
    assert_eq!(config.level, "debug");
    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_target);
}

#[test]
fn test_log_format_from_str() {
    assert_eq!(LogFormat::from("json"), LogFormat::Json);
    assert_eq!(LogFormat::from("COMPACT"), LogFormat::Compact);
    assert_eq!(LogFormat::from("pretty"), LogFormat::Pretty);
    assert_eq!(LogFormat::from(""), LogFormat::Pretty);
}

#[test]
fn test_mask_sensitive_exact_boundary() {
    assert_eq!(mask_sensitive("abcd", 2), "****");
    assert_eq!(mask_sensitive("abcde", 2), "ab*de");
}

#[test]
fn test_mask_amount_boundaries() {
    assert_eq!(mask_amount(&dec!(999.99)), "***");
    assert_eq!(mask_amount(&Decimal::from(1_000)), "***K+");
    assert_eq!(mask_amount(&Decimal::from(999_999)), "***K+");
    assert_eq!(mask_amount(&Decimal::from(1_000_000)), "***M+");
}

#[test]
fn test_latency_timer_monotonic() {
    let timer = LatencyTimer::default();
    let first = timer.elapsed_ms();
    let second = timer.elapsed_ms();
    assert!(first >= 0.0);
    assert!(second >= first);
}

#[tokio::test]
async fn test_transfer_metrics_are_exported() {
    init_metrics(None).expect("Failed to install recorder");
    // Installing twice is a no-op.
    init_metrics(None).expect("Second install failed");

    let ledger = TestLedger::new();
    let a = ledger.open("alice", dec!(100)).await;
    let b = ledger.open("bob", dec!(0)).await;

    ledger
        .engine
        .transfer(transfer_request(a.id, b.id, dec!(10)))
        .await
        .unwrap();
    ledger
        .engine
        .transfer(transfer_request(a.id, b.id, dec!(1000)))
        .await
        .unwrap_err();
    get_metrics().record_hook_failure();

    let rendered = render_metrics().expect("Recorder installed without listener");
    assert!(rendered.contains("ledger_transfers_total"));
    assert!(rendered.contains("currency=\"USD\""));
    assert!(rendered.contains("ledger_transfers_failed_total"));
    assert!(rendered.contains("reason=\"conflict\""));
    assert!(rendered.contains("ledger_unit_of_work_rollbacks_total"));
    assert!(rendered.contains("ledger_post_commit_hook_failures_total"));
    assert!(rendered.contains("ledger_transfer_duration_ms"));
}
