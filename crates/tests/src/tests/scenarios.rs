use ms_types::{ChannelId, ChannelState};

use crate::testing_tool::common::{ChallengeRecord, TestContext};

#[tokio::test]
async fn test_close_of_unknown_channel() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x01);
    ctx.chain.close(channel_id, ctx.counterparty.address(), None);

    assert_eq!(ctx.poll().await, 1);
    assert!(ctx.store.list().unwrap().is_empty());
    assert!(ctx.challenger.records().is_empty());
}

#[tokio::test]
async fn test_stale_close_is_challenged() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x01);
    let bp = ctx.deliver_proof(channel_id, 1).await;
    ctx.service.drain_all().await.unwrap();

    let entries = ctx.store.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].channel_id(), &channel_id);

    // participant1 closes without showing a proof newer than ours
    ctx.chain.close(channel_id, bp.participant1, None);
    ctx.poll().await;

    assert_eq!(
        ctx.challenger.records(),
        vec![ChallengeRecord {
            channel_id,
            closing_participant: bp.participant1,
            nonce: 1,
        }]
    );
    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    assert!(matches!(entry.state, ChannelState::Challenged { .. }));
}

#[tokio::test]
async fn test_settle_removes_entry() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x02);
    ctx.deliver_proof(channel_id, 1).await;
    ctx.service.drain_all().await.unwrap();
    assert!(ctx.store.get(&channel_id).unwrap().is_some());

    ctx.chain.settle(channel_id);
    ctx.poll().await;
    assert!(ctx.store.get(&channel_id).unwrap().is_none());
}

#[tokio::test]
async fn test_out_of_order_proofs_keep_highest_nonce() {
    let ctx = TestContext::setup();
    let channel_id = ChannelId::from_low_u64_be(0x03);
    ctx.deliver_proof(channel_id, 5).await;
    ctx.service.drain_all().await.unwrap();
    ctx.deliver_proof(channel_id, 3).await;
    ctx.service.drain_all().await.unwrap();
    assert_eq!(ctx.stored_nonce(&channel_id), Some(5));

    // concurrent ingestion converges too
    let channel_id = ChannelId::from_low_u64_be(0x04);
    for nonce in [3, 5, 1, 4, 2] {
        ctx.deliver_proof(channel_id, nonce).await;
    }
    ctx.service.drain_all().await.unwrap();
    assert_eq!(ctx.stored_nonce(&channel_id), Some(5));
    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    assert_eq!(entry.balance_proof.transferred_amount, 50);
}
