use std::net::SocketAddr;

use ms_rpc_server::{bind_rest_server, BalanceProofRecord, BALANCE_PROOFS_PATH};
use ms_types::{ChannelId, ChannelState};
use tokio::sync::oneshot;

use crate::testing_tool::common::TestContext;

#[tokio::test]
async fn test_rest_server_reflects_monitored_channels() {
    let ctx = TestContext::setup();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let listen: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (addr, serving) = bind_rest_server(&listen, ctx.service.store().clone(), async {
        let _ = stop_rx.await;
    })
    .unwrap();
    let server = tokio::spawn(serving);
    let url = format!("http://{}{}", addr, BALANCE_PROOFS_PATH);
    let url = &url;
    let fetch = move || async move {
        reqwest::get(url)
            .await
            .unwrap()
            .json::<Vec<BalanceProofRecord>>()
            .await
            .unwrap()
    };

    assert!(fetch().await.is_empty());

    let watched = ChannelId::from_low_u64_be(0x30);
    let disputed = ChannelId::from_low_u64_be(0x31);
    ctx.deliver_proof(watched, 1).await;
    ctx.deliver_proof(disputed, 2).await;
    ctx.service.drain_all().await.unwrap();
    ctx.chain.close(disputed, ctx.counterparty.address(), None);
    ctx.poll().await;

    let mut records = fetch().await;
    records.sort_by_key(|record| record.channel_id);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].channel_id, watched);
    assert_eq!(records[0].state, ChannelState::Watched);
    assert_eq!(records[0].transferred_amount, "10");
    assert_eq!(records[1].channel_id, disputed);
    assert!(matches!(records[1].state, ChannelState::Challenged { .. }));

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
