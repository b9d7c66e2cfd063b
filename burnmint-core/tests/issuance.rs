//! Batch issuance integration tests.

use std::time::{Duration, Instant};

use burnmint_core::{
    AssetCatalog, BurnCoordinator, BurnProofError, IssuanceOrchestrator, IssuanceOutcome,
    IssuanceStage, PipelineConfig, RetryPolicy, TokenAmount, TransactionKind, MAX_UNITS,
};
use burnmint_test_fixtures::{MockLedger, HOLDER, ISSUER};

fn orchestrator<'a>(
    ledger: &'a MockLedger,
    catalog: &'a AssetCatalog,
    policy: RetryPolicy,
) -> IssuanceOrchestrator<'a, MockLedger> {
    IssuanceOrchestrator::new(ledger, catalog, ISSUER, policy)
}

#[tokio::test]
async fn one_failed_token_does_not_stop_the_batch() {
    let ledger = MockLedger::new(ISSUER);
    // LYM is the 13th catalog entry.
    ledger.reject_currency("LYM", "tecNO_PERMISSION").await;
    let catalog = AssetCatalog::multi_asset();

    let report = orchestrator(&ledger, catalog, RetryPolicy::immediate(3))
        .setup_and_issue(HOLDER, 1000)
        .await;

    assert_eq!(report.success_count(), 24);
    assert_eq!(report.total_attempted(), 25);
    assert_eq!(report.total_issued(), 24_000);
    assert!(!report.is_complete(catalog.len()));

    let results = report.results();
    assert_eq!(results.len(), 25);
    let failed = &results[12];
    assert_eq!(failed.token, "LYM");
    assert!(!failed.success());
    assert_eq!(failed.error_code(), Some("tecNO_PERMISSION"));
    assert_eq!(failed.attempts, 1);
    assert!(matches!(
        failed.outcome,
        IssuanceOutcome::Failed {
            stage: IssuanceStage::TrustLine,
            ..
        }
    ));

    for (entry, expected) in results[13..].iter().zip(&catalog.all()[13..]) {
        assert_eq!(entry.token, expected.symbol);
        assert!(entry.success(), "{} should be issued", entry.token);
    }
    assert_eq!(ledger.balance(HOLDER, "LYZ").await, TokenAmount::from_units(1000));
    assert_eq!(ledger.balance(HOLDER, "LYM").await, TokenAmount::ZERO);
    assert_eq!(
        ledger.trust_limit(HOLDER, "LYA").await,
        Some(TokenAmount::from_units(100_000))
    );
    // Two submissions per issued token, one for the rejected trust line.
    assert_eq!(ledger.submission_count().await, 49);

    match report.into_result(catalog.len()) {
        Err(BurnProofError::PartialIssuanceFailure {
            succeeded,
            attempted,
        }) => {
            assert_eq!(succeeded, 24);
            assert_eq!(attempted, 25);
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.success_count())),
    }
}

#[tokio::test]
async fn complete_batch_converts_to_ok() {
    let ledger = MockLedger::new(ISSUER);
    let catalog = AssetCatalog::multi_asset();

    let report = orchestrator(&ledger, catalog, RetryPolicy::immediate(1))
        .setup_and_issue(HOLDER, 10)
        .await;

    assert!(report.is_complete(25));
    let report = report.into_result(25).expect("batch should be complete");
    assert_eq!(report.total_issued(), 250);

    let submitted = ledger.submitted().await;
    assert!(matches!(submitted[0].kind, TransactionKind::TrustSet { .. }));
    assert!(matches!(submitted[1].kind, TransactionKind::Payment { .. }));
    assert_eq!(submitted[0].currency(), Some("LYA"));
    assert_eq!(submitted[49].currency(), Some("LYZ"));
}

#[tokio::test]
async fn issue_stage_failure_is_recorded_with_its_stage() {
    let ledger = MockLedger::new(ISSUER);
    ledger.open_trust_line(HOLDER, "LAY", 100_000).await;
    ledger.reject_currency("LAY", "tecNO_AUTH").await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(3))
        .setup_and_issue(HOLDER, 1000)
        .await;

    let entry = &report.results()[0];
    assert_eq!(entry.error_code(), Some("tecNO_AUTH"));
    assert!(entry.transaction_hash().is_some());
    assert!(matches!(
        entry.outcome,
        IssuanceOutcome::Failed {
            stage: IssuanceStage::Issue,
            ..
        }
    ));
    assert_eq!(report.success_count(), 0);
}

#[tokio::test]
async fn sufficient_trust_line_is_not_resubmitted() {
    let ledger = MockLedger::new(ISSUER);
    ledger.open_trust_line(HOLDER, "LAY", 500_000).await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(1))
        .setup_and_issue(HOLDER, 1000)
        .await;

    assert_eq!(report.success_count(), 1);
    assert!(matches!(
        report.results()[0].outcome,
        IssuanceOutcome::Issued {
            trust_line_hash: None,
            ..
        }
    ));
    assert_eq!(ledger.submission_count().await, 1);
    assert_eq!(
        ledger.trust_limit(HOLDER, "LAY").await,
        Some(TokenAmount::from_units(500_000))
    );
}

#[tokio::test]
async fn low_trust_limit_is_raised() {
    let ledger = MockLedger::new(ISSUER);
    ledger.open_trust_line(HOLDER, "LAY", 10).await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(1))
        .setup_and_issue(HOLDER, 1000)
        .await;

    assert_eq!(report.success_count(), 1);
    assert_eq!(ledger.submission_count().await, 2);
    assert_eq!(
        ledger.trust_limit(HOLDER, "LAY").await,
        Some(TokenAmount::from_units(100_000))
    );
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::from_units(1000));
}

#[tokio::test]
async fn custom_trust_limit_is_requested() {
    let ledger = MockLedger::new(ISSUER);
    let catalog = AssetCatalog::single_asset();

    let report = orchestrator(&ledger, catalog, RetryPolicy::immediate(1))
        .with_trust_limit(TokenAmount::from_units(5000))
        .setup_and_issue(HOLDER, 1000)
        .await;

    assert_eq!(report.success_count(), 1);
    assert_eq!(
        ledger.trust_limit(HOLDER, "LAY").await,
        Some(TokenAmount::from_units(5000))
    );
}

#[tokio::test]
async fn retryable_codes_are_retried_up_to_the_limit() {
    let ledger = MockLedger::new(ISSUER);
    ledger.fail_transiently("LAY", "terQUEUED", 2).await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(3))
        .setup_and_issue(HOLDER, 1000)
        .await;

    let entry = &report.results()[0];
    assert!(entry.success());
    // Three trust-line attempts, one issuance.
    assert_eq!(entry.attempts, 4);
    assert_eq!(ledger.submission_count().await, 4);
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::from_units(1000));

    let ledger = MockLedger::new(ISSUER);
    ledger.fail_transiently("LAY", "telCAN_NOT_QUEUE", 5).await;
    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(2))
        .setup_and_issue(HOLDER, 1000)
        .await;
    let entry = &report.results()[0];
    assert_eq!(entry.error_code(), Some("telCAN_NOT_QUEUE"));
    assert_eq!(entry.attempts, 2);
}

#[tokio::test]
async fn lost_response_for_applied_transaction_is_not_resubmitted() {
    let ledger = MockLedger::new(ISSUER);
    ledger.open_trust_line(HOLDER, "LAY", 100_000).await;
    ledger.drop_submissions(1, true).await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(3))
        .setup_and_issue(HOLDER, 1000)
        .await;

    let entry = &report.results()[0];
    assert!(entry.success());
    assert_eq!(entry.attempts, 1);
    assert_eq!(ledger.submission_count().await, 1);
    assert_eq!(ledger.applied_count().await, 1);
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::from_units(1000));
}

#[tokio::test]
async fn lost_submission_is_resubmitted_after_confirming_absence() {
    let ledger = MockLedger::new(ISSUER);
    ledger.open_trust_line(HOLDER, "LAY", 100_000).await;
    ledger.drop_submissions(1, false).await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(3))
        .setup_and_issue(HOLDER, 1000)
        .await;

    let entry = &report.results()[0];
    assert!(entry.success());
    assert_eq!(entry.attempts, 2);
    assert_eq!(ledger.submission_count().await, 2);
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::from_units(1000));
}

#[tokio::test]
async fn unconfirmable_outcome_stops_retrying() {
    let ledger = MockLedger::new(ISSUER);
    ledger.open_trust_line(HOLDER, "LAY", 100_000).await;
    ledger.leave_unvalidated().await;
    ledger.drop_submissions(1, true).await;

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(3))
        .setup_and_issue(HOLDER, 1000)
        .await;

    let entry = &report.results()[0];
    assert!(!entry.success());
    assert!(entry
        .error_code()
        .expect("failure has a code")
        .starts_with("ledger:"));
    assert!(entry.transaction_hash().is_some());
    assert_eq!(ledger.submission_count().await, 1);
}

#[tokio::test]
async fn zero_amount_is_rejected_without_submission() {
    let ledger = MockLedger::new(ISSUER);

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(1))
        .setup_and_issue(HOLDER, 0)
        .await;

    assert_eq!(report.success_count(), 0);
    assert_eq!(report.results()[0].error_code(), Some("invalid_amount"));
    assert_eq!(ledger.submission_count().await, 0);
}

#[tokio::test]
async fn unrepresentable_amount_is_rejected_without_submission() {
    let ledger = MockLedger::new(ISSUER);

    let report = orchestrator(&ledger, AssetCatalog::single_asset(), RetryPolicy::immediate(1))
        .setup_and_issue(HOLDER, MAX_UNITS + 1)
        .await;

    let entry = &report.results()[0];
    assert_eq!(entry.error_code(), Some("invalid_amount"));
    assert!(matches!(
        entry.outcome,
        IssuanceOutcome::Failed {
            stage: IssuanceStage::Issue,
            transaction_hash: None,
            ..
        }
    ));
    assert_eq!(report.success_count(), 0);
    assert_eq!(report.total_issued(), 0);
    assert_eq!(ledger.submission_count().await, 0);
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::ZERO);
}

#[tokio::test]
async fn submissions_are_paced() {
    let ledger = MockLedger::new(ISSUER);
    let pacing = Duration::from_millis(25);
    let policy = RetryPolicy::immediate(1).with_pacing(pacing);

    let started = Instant::now();
    let report = orchestrator(&ledger, AssetCatalog::single_asset(), policy)
        .setup_and_issue(HOLDER, 1000)
        .await;

    assert_eq!(report.success_count(), 1);
    // Trust line then issuance: one gap.
    assert!(started.elapsed() >= pacing);
}

#[tokio::test]
async fn issuer_setup_enables_default_ripple() {
    let ledger = MockLedger::new(ISSUER);
    let hash = orchestrator(&ledger, AssetCatalog::multi_asset(), RetryPolicy::immediate(1))
        .configure_issuer()
        .await
        .expect("setup should succeed");

    assert_eq!(hash.len(), 64);
    assert!(ledger.default_ripple().await);
}

#[tokio::test]
async fn issued_tokens_can_be_burned() {
    let ledger = MockLedger::new(ISSUER);
    let catalog = AssetCatalog::multi_asset();

    let report = orchestrator(&ledger, catalog, RetryPolicy::immediate(1))
        .setup_and_issue(HOLDER, 1000)
        .await;
    assert_eq!(report.success_count(), 25);

    let result = BurnCoordinator::new(&ledger, catalog, ISSUER)
        .burn(HOLDER, "LYQ", 1000)
        .await
        .expect("burn should succeed");
    assert!(result.proof.verify_commitment());
    assert_eq!(ledger.balance(HOLDER, "LYQ").await, TokenAmount::ZERO);
}

#[tokio::test]
async fn configured_pipeline_issues_and_burns() {
    let vars = [
        ("BURNMINT_ISSUER_ADDRESS", ISSUER),
        ("BURNMINT_CATALOG_MODE", "single"),
        ("BURNMINT_TOKENS_PER_ASSET", "250"),
        ("BURNMINT_TRUST_LIMIT", "5000"),
        ("BURNMINT_MAX_ATTEMPTS", "2"),
        ("BURNMINT_BASE_DELAY_MS", "0"),
        ("BURNMINT_PACING_MS", "0"),
        ("BURNMINT_JITTER", "0"),
    ];
    let config = PipelineConfig::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("config should load");

    let ledger = MockLedger::new(ISSUER);
    ledger.fail_transiently("LAY", "terQUEUED", 1).await;

    let report = config.issue_all(&ledger, HOLDER).await;
    assert!(report.is_complete(1));
    assert_eq!(report.total_issued(), 250);
    // One retried trust line, one issuance.
    assert_eq!(report.results()[0].attempts, 3);
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::from_units(250));
    assert_eq!(
        ledger.trust_limit(HOLDER, "LAY").await,
        Some(TokenAmount::from_units(5000))
    );

    let result = config
        .burn_coordinator(&ledger)
        .burn(HOLDER, "LAY", 250)
        .await
        .expect("burn should succeed");
    assert_eq!(result.proof.issuer, ISSUER);
    assert_eq!(ledger.balance(HOLDER, "LAY").await, TokenAmount::ZERO);
}
