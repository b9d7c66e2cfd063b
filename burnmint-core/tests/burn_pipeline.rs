//! Burn pipeline integration tests.
//!
//! Drives [`BurnCoordinator`] against the in-memory ledger: preconditions,
//! settlement, fact retrieval and proof assembly end to end.

use burnmint_core::{
    select, AssetCatalog, BurnCoordinator, BurnProof, BurnProofError, LedgerClient,
    ProofAssembler, TokenAmount, MAX_UNITS,
};
use burnmint_test_fixtures::{digest, sample_burn, MockLedger, GENESIS_LEDGER_INDEX, HOLDER, ISSUER};

async fn funded_ledger(token: &str, units: u64) -> MockLedger {
    let ledger = MockLedger::new(ISSUER);
    ledger.fund(HOLDER, token, units).await;
    ledger
}

#[tokio::test]
async fn burning_whole_balance_produces_verifiable_proof() {
    let ledger = funded_ledger("LYA", 100).await;
    let catalog = AssetCatalog::multi_asset();
    let coordinator = BurnCoordinator::new(&ledger, catalog, ISSUER);

    let result = coordinator
        .burn(HOLDER, "LYA", 100)
        .await
        .expect("burn should succeed");

    assert_eq!(ledger.balance(HOLDER, "LYA").await, TokenAmount::ZERO);
    assert_eq!(ledger.submission_count().await, 1);

    let proof = &result.proof;
    assert_eq!(result.transaction_hash, proof.xrpl_tx_hash);
    assert_eq!(proof.xrpl_tx_hash.len(), 64);
    assert_eq!(proof.burn_amount, 100);
    assert_eq!(proof.token, "LYA");
    assert_eq!(proof.issuer, ISSUER);
    assert_eq!(proof.burner_address, HOLDER);
    assert!(proof.validated);
    assert!(proof.transaction_result.is_success());

    let settled_index = GENESIS_LEDGER_INDEX + 1;
    assert_eq!(result.ledger_index, settled_index);
    assert_eq!(proof.ledger_hash, digest(&format!("ledger:{}", settled_index)));
    assert_eq!(
        proof.ledger_proof.parent_hash,
        digest(&format!("ledger:{}", GENESIS_LEDGER_INDEX))
    );
    assert_eq!(proof.transaction_details.destination.as_deref(), Some(ISSUER));
    assert_eq!(
        proof.transaction_details.memos[0].data_text().as_deref(),
        Some("LYA Burn - 100 tokens for NFT mint")
    );

    let expected_id = select(&proof.xrpl_tx_hash, 25).expect("valid hash");
    assert_eq!(proof.media_id, expected_id);
    assert_eq!(catalog.media_format(expected_id), Some(proof.media_format.as_str()));
    assert!(proof.verify_commitment());
    assert!(proof.verify_selection(25).expect("valid hash"));
}

#[tokio::test]
async fn burning_more_than_balance_submits_nothing() {
    let ledger = funded_ledger("LYA", 100).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let err = coordinator.burn(HOLDER, "LYA", 101).await.unwrap_err();
    match err {
        BurnProofError::InsufficientBalance { token, have, need } => {
            assert_eq!(token, "LYA");
            assert_eq!(have, TokenAmount::from_units(100));
            assert_eq!(need, TokenAmount::from_units(101));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.submission_count().await, 0);
    assert_eq!(ledger.balance(HOLDER, "LYA").await, TokenAmount::from_units(100));
}

#[tokio::test]
async fn precondition_failures_are_reported_before_submission() {
    let ledger = funded_ledger("LYA", 100).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let err = coordinator.burn(HOLDER, "LYA", 0).await.unwrap_err();
    assert!(matches!(err, BurnProofError::InvalidAmount { amount: 0, .. }));

    let err = coordinator.burn(HOLDER, "LYY", 1).await.unwrap_err();
    assert!(matches!(err, BurnProofError::UnknownTokenType(ref s) if s == "LYY"));

    // Unknown holder has no trust line, which reads as a zero balance.
    let err = coordinator.burn("rUnknownHolder", "LYA", 1).await.unwrap_err();
    assert!(matches!(err, BurnProofError::InsufficientBalance { .. }));

    assert_eq!(ledger.submission_count().await, 0);
}

#[tokio::test]
async fn unrepresentable_amount_is_rejected_before_submission() {
    let ledger = funded_ledger("LYA", MAX_UNITS).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let too_large = MAX_UNITS + 1;
    let err = coordinator.burn(HOLDER, "LYA", too_large).await.unwrap_err();
    match err {
        BurnProofError::InvalidAmount { token, amount } => {
            assert_eq!(token, "LYA");
            assert_eq!(amount, too_large);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.submission_count().await, 0);
    assert_eq!(ledger.balance(HOLDER, "LYA").await, TokenAmount::from_units(MAX_UNITS));

    // Against a small balance the amount is still the first thing checked.
    let ledger = funded_ledger("LYA", 100).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);
    let err = coordinator.burn(HOLDER, "LYA", 20_000_000_000_000).await.unwrap_err();
    assert!(matches!(
        err,
        BurnProofError::InvalidAmount {
            amount: 20_000_000_000_000,
            ..
        }
    ));

    // The largest representable amount burns exactly.
    let ledger = funded_ledger("LYA", MAX_UNITS).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);
    let result = coordinator
        .burn(HOLDER, "LYA", MAX_UNITS)
        .await
        .expect("burn should succeed");
    assert_eq!(result.proof.burn_amount, MAX_UNITS);
    assert_eq!(ledger.balance(HOLDER, "LYA").await, TokenAmount::ZERO);
}

#[tokio::test]
async fn malformed_hash_is_refused_before_fact_retrieval() {
    let ledger = MockLedger::new(ISSUER);
    ledger.fail_ledger_lookups().await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let (mut burn, _) = sample_burn();
    burn.hash.truncate(63);
    let err = coordinator.prove(&burn).await.unwrap_err();
    assert!(matches!(err, BurnProofError::InvalidTransactionHash(ref h) if h.len() == 63));

    let (mut burn, _) = sample_burn();
    burn.hash.replace_range(0..1, "Z");
    let err = coordinator.prove(&burn).await.unwrap_err();
    assert!(matches!(err, BurnProofError::InvalidTransactionHash(_)));
}

#[tokio::test]
async fn symbol_lookup_is_case_insensitive() {
    let ledger = funded_ledger("LYB", 10).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let result = coordinator
        .burn(HOLDER, "lyb", 4)
        .await
        .expect("burn should succeed");
    assert_eq!(result.proof.token, "LYB");
    assert_eq!(ledger.balance(HOLDER, "LYB").await, TokenAmount::from_units(6));
}

#[tokio::test]
async fn rejected_burn_surfaces_code_verbatim() {
    let ledger = funded_ledger("LYA", 100).await;
    ledger.reject_currency("LYA", "tecFROZEN").await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let err = coordinator.burn(HOLDER, "LYA", 50).await.unwrap_err();
    match &err {
        BurnProofError::BurnRejected {
            token,
            amount,
            tx_hash,
            code,
        } => {
            assert_eq!(token, "LYA");
            assert_eq!(*amount, 50);
            assert_eq!(tx_hash.len(), 64);
            assert_eq!(code, "tecFROZEN");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("tecFROZEN"));
    assert_eq!(ledger.balance(HOLDER, "LYA").await, TokenAmount::from_units(100));
}

#[tokio::test]
async fn ledger_fact_failure_keeps_transaction_hash() {
    let ledger = funded_ledger("LYA", 100).await;
    ledger.fail_ledger_lookups().await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let err = coordinator.burn(HOLDER, "LYA", 100).await.unwrap_err();
    let hash = match &err {
        BurnProofError::LedgerUnavailable {
            operation, tx_hash, ..
        } => {
            assert_eq!(*operation, "get_ledger");
            tx_hash.clone().expect("hash should be known")
        }
        other => panic!("unexpected error: {other}"),
    };

    // The burn itself settled; the hash points at it.
    let record = ledger
        .get_transaction(&hash)
        .await
        .expect("burn should be on ledger");
    assert!(record.validated);
    assert_eq!(ledger.balance(HOLDER, "LYA").await, TokenAmount::ZERO);
    assert_eq!(err.tx_hash(), Some(hash.as_str()));
}

#[tokio::test]
async fn balance_query_failure_is_ledger_unavailable() {
    let ledger = funded_ledger("LYA", 100).await;
    ledger.fail_trust_line_queries().await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let err = coordinator.burn(HOLDER, "LYA", 1).await.unwrap_err();
    assert!(matches!(
        err,
        BurnProofError::LedgerUnavailable {
            operation: "get_trust_lines",
            tx_hash: None,
            ..
        }
    ));
    assert_eq!(ledger.submission_count().await, 0);
}

#[tokio::test]
async fn unvalidated_burn_yields_no_proof() {
    let ledger = funded_ledger("LYA", 100).await;
    ledger.leave_unvalidated().await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let err = coordinator.burn(HOLDER, "LYA", 10).await.unwrap_err();
    match err {
        BurnProofError::NotValidated { tx_hash } => assert_eq!(tx_hash.len(), 64),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn single_asset_burn_selects_from_media_pool() {
    let ledger = funded_ledger("LAY", 5).await;
    let catalog = AssetCatalog::single_asset();
    let coordinator = BurnCoordinator::new(&ledger, catalog, ISSUER);

    let result = coordinator
        .burn(HOLDER, "LAY", 5)
        .await
        .expect("burn should succeed");
    let proof = result.proof;

    assert_eq!(proof.token, "LAY");
    assert!((1..=25).contains(&proof.media_id));
    assert!(proof.verify_selection(catalog.selection_size()).expect("valid hash"));
    assert_eq!(catalog.media_format(proof.media_id), Some(proof.media_format.as_str()));
    assert_eq!(
        proof.transaction_details.memos[0].type_text().as_deref(),
        Some("token_burn")
    );
}

#[tokio::test]
async fn proof_replays_identically_from_its_artifact() {
    let ledger = funded_ledger("LYD", 3).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);
    let proof = coordinator
        .burn(HOLDER, "LYD", 3)
        .await
        .expect("burn should succeed")
        .proof;

    let json = serde_json::to_string_pretty(&proof).expect("proof serializes");
    let loaded: BurnProof = serde_json::from_str(&json).expect("proof deserializes");
    assert_eq!(loaded, proof);
    assert_eq!(ProofAssembler::replay(&loaded), proof);
    assert!(loaded.verify_commitment());
}

#[tokio::test]
async fn consecutive_burns_get_distinct_hashes() {
    let ledger = funded_ledger("LYE", 10).await;
    let coordinator = BurnCoordinator::new(&ledger, AssetCatalog::multi_asset(), ISSUER);

    let first = coordinator.burn(HOLDER, "LYE", 4).await.expect("first burn");
    let second = coordinator.burn(HOLDER, "LYE", 4).await.expect("second burn");
    assert_ne!(first.transaction_hash, second.transaction_hash);
    assert_eq!(second.ledger_index, first.ledger_index + 1);

    let err = coordinator.burn(HOLDER, "LYE", 4).await.unwrap_err();
    assert!(matches!(err, BurnProofError::InsufficientBalance { .. }));
    assert_eq!(ledger.balance(HOLDER, "LYE").await, TokenAmount::from_units(2));
}
