use std::sync::Arc;

use ms_challenge::{OnchainChallenger, StaticValidator};
use ms_monitor::{CloseOutcome, MonitorError, MonitoringService, MonitoringServiceCreateArgs};
use ms_rpc_client::contract::decode_update_transfer_input;
use ms_store::BalanceProofStore;
use ms_types::{Address, ChannelId, ChannelState, FeeInfo, Message, OnchainBalanceProof, H256};

use crate::testing_tool::common::{Participant, TestContext};

fn onchain_proof(nonce: u64) -> OnchainBalanceProof {
    OnchainBalanceProof {
        nonce,
        transferred_amount: u128::from(nonce) * 10,
        locksroot: H256::default(),
        extra_hash: H256::default(),
    }
}

#[tokio::test]
async fn test_fee_info_is_ignored() {
    let ctx = TestContext::setup();
    ctx.deliver(Message::FeeInfo(FeeInfo {
        channel_id: ChannelId::from_low_u64_be(1),
        nonce: 1,
        percentage_fee: "0.01".to_string(),
    }))
    .await;
    assert!(ctx.service.tracker().is_empty());
    ctx.service.drain_all().await.unwrap();
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_drain_all_is_idempotent() {
    let ctx = TestContext::setup();
    ctx.service.drain_all().await.unwrap();
    for channel in 1..=3 {
        ctx.deliver_proof(ChannelId::from_low_u64_be(channel), 1).await;
    }
    ctx.service.drain_all().await.unwrap();
    assert!(ctx.service.tracker().is_empty());
    assert_eq!(ctx.store.len(), 3);
    ctx.service.drain_all().await.unwrap();
    assert_eq!(ctx.store.len(), 3);
}

#[tokio::test]
async fn test_close_waits_for_inflight_ingestion() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x10);
    // no drain, the close handler must still see the proof
    ctx.deliver_proof(channel_id, 7).await;
    ctx.chain
        .close(channel_id, ctx.counterparty.address(), Some(&onchain_proof(2)));
    ctx.poll().await;

    let records = ctx.challenger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].nonce, 7);
}

#[tokio::test]
async fn test_valid_close_stops_watching() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x11);
    ctx.deliver_proof(channel_id, 4).await;
    ctx.service.drain_all().await.unwrap();

    let closer = ctx.counterparty.address();
    let outcome = ctx
        .service
        .handler()
        .on_channel_closed(&channel_id, &closer, Some(&onchain_proof(4)), 9)
        .await
        .unwrap();
    assert_eq!(outcome, CloseOutcome::Accepted);
    assert!(ctx.store.get(&channel_id).unwrap().is_none());
    assert!(ctx.challenger.records().is_empty());
}

#[tokio::test]
async fn test_challenged_channel_is_not_challenged_again() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x12);
    ctx.deliver_proof(channel_id, 4).await;
    ctx.service.drain_all().await.unwrap();

    let handler = ctx.service.handler();
    let closer = ctx.counterparty.address();
    let outcome = handler
        .on_channel_closed(&channel_id, &closer, Some(&onchain_proof(1)), 9)
        .await
        .unwrap();
    assert_eq!(outcome, CloseOutcome::Challenged { tx_hash: None });
    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    assert_eq!(entry.state, ChannelState::Challenged { block_number: 9 });

    let outcome = handler
        .on_channel_closed(&channel_id, &closer, Some(&onchain_proof(1)), 10)
        .await
        .unwrap();
    assert_eq!(outcome, CloseOutcome::AlreadyChallenged);
    assert_eq!(ctx.challenger.records().len(), 1);

    // a newer proof keeps the challenged state
    ctx.deliver_proof(channel_id, 5).await;
    ctx.service.drain_all().await.unwrap();
    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    assert_eq!(entry.nonce(), 5);
    assert!(entry.is_challenged());
}

#[tokio::test]
async fn test_proof_with_other_participants_is_rejected() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x14);
    let original = ctx.deliver_proof(channel_id, 1).await;
    ctx.service.drain_all().await.unwrap();

    // signed by a participant of its own pair, but not of the stored channel
    let outsider = Participant::random();
    let accomplice = Participant::random();
    let other = outsider.sign(channel_id, accomplice.address(), 100, 1000);
    ctx.deliver(Message::BalanceProof(other)).await;
    ctx.service.drain_all().await.unwrap();

    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    assert_eq!(entry.balance_proof, original);
    assert!(entry.is_participant(&ctx.counterparty.address()));

    // the stale close of the real counterparty is still disputed
    ctx.chain
        .close(channel_id, ctx.counterparty.address(), Some(&onchain_proof(0)));
    ctx.poll().await;
    let records = ctx.challenger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].nonce, 1);
}

#[tokio::test]
async fn test_close_by_stranger_is_a_data_mismatch() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x13);
    ctx.deliver_proof(channel_id, 2).await;
    ctx.service.drain_all().await.unwrap();
    let before = ctx.store.get(&channel_id).unwrap();

    let stranger = Address::from_low_u64_be(0xdead);
    let outcome = ctx
        .service
        .handler()
        .on_channel_closed(&channel_id, &stranger, None, 9)
        .await
        .unwrap();
    assert_eq!(outcome, CloseOutcome::DataMismatch);
    assert_eq!(ctx.store.get(&channel_id).unwrap(), before);
    assert!(ctx.challenger.records().is_empty());
}

#[tokio::test]
async fn test_validator_is_pluggable() {
    let ctx = TestContext::builder()
        .validator(Arc::new(StaticValidator::accept()))
        .build();
    let channel_id = ChannelId::from_low_u64_be(0x14);
    ctx.deliver_proof(channel_id, 8).await;
    ctx.service.drain_all().await.unwrap();

    // stale, but the policy accepts everything
    ctx.chain
        .close(channel_id, ctx.counterparty.address(), Some(&onchain_proof(1)));
    ctx.poll().await;
    assert!(ctx.challenger.records().is_empty());
    assert!(ctx.store.get(&channel_id).unwrap().is_none());

    let ctx = TestContext::builder()
        .validator(Arc::new(StaticValidator::reject("always")))
        .build();
    ctx.deliver_proof(channel_id, 1).await;
    ctx.service.drain_all().await.unwrap();
    ctx.chain
        .close(channel_id, ctx.counterparty.address(), Some(&onchain_proof(9)));
    ctx.poll().await;
    assert_eq!(ctx.challenger.records().len(), 1);
}

#[tokio::test]
async fn test_transfer_updated_keeps_entry() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x15);
    ctx.deliver_proof(channel_id, 3).await;
    ctx.service.drain_all().await.unwrap();
    let before = ctx.store.get(&channel_id).unwrap();

    ctx.chain
        .update_transfer(channel_id, ctx.protected.address());
    assert_eq!(ctx.poll().await, 1);
    assert_eq!(ctx.store.get(&channel_id).unwrap(), before);
}

#[tokio::test]
async fn test_onchain_challenge_submits_stored_proof() {
    let protected = Participant::random();
    let sender = protected.address();
    // the challenger needs the chain of the context, wire it by hand
    let ctx = TestContext::builder().protected(protected).build();
    let challenger = OnchainChallenger::new(ctx.chain.clone(), sender);
    let channel_id = ChannelId::from_low_u64_be(0x16);
    ctx.deliver_proof(channel_id, 6).await;
    ctx.service.drain_all().await.unwrap();

    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    let closer = ctx.counterparty.address();
    let close = ms_challenge::ChannelClose {
        channel_id: &channel_id,
        closing_participant: &closer,
        closing_proof: None,
        block_number: 3,
    };
    let tx_hash = ms_challenge::Challenger::challenge(&challenger, &entry, &close)
        .await
        .unwrap();
    assert!(tx_hash.is_some());

    let sent = ctx.chain.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, sender);
    assert_eq!(sent[0].to, *channel_id.address());
    let submitted = decode_update_transfer_input(&sent[0].data).unwrap().unwrap();
    assert_eq!(submitted.nonce, 6);
    assert_eq!(submitted.transferred_amount, 60);
}

#[tokio::test]
async fn test_store_bound_to_other_receiver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");
    let owner = Participant::random();
    let owner_address = owner.address();
    {
        let ctx = TestContext::builder()
            .protected(owner)
            .store(BalanceProofStore::open(&path).unwrap())
            .build();
        ctx.deliver_proof(ChannelId::from_low_u64_be(1), 1).await;
        ctx.service.drain_all().await.unwrap();
        ctx.store.flush().unwrap();
    }

    let store = BalanceProofStore::open(&path).unwrap();
    assert_eq!(store.identity().unwrap().unwrap().receiver, owner_address);
    assert_eq!(store.len(), 1);

    let intruder = Participant::random();
    let ctx = TestContext::builder().build();
    let err = MonitoringService::create(MonitoringServiceCreateArgs {
        privkey: intruder.privkey().to_string(),
        network_id: 6,
        contract_address: Address::from_low_u64_be(0xc0),
        store,
        transport: Arc::new(ms_transport::LocalTransport::new(
            ms_transport::TransportIdentity {
                address: intruder.address(),
            },
        )),
        monitor: ctx.monitor.clone(),
        validator: Arc::new(ms_challenge::NonceValidator),
        challenger: ctx.challenger.clone(),
        config: Default::default(),
    })
    .err()
    .unwrap();
    assert!(matches!(err, MonitorError::IdentityMismatch(_)));
}
