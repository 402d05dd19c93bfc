use std::{sync::Arc, time::Duration};

use ms_chain::BlockchainMonitor;
use ms_challenge::NonceValidator;
use ms_config::MonitorConfig;
use ms_monitor::{MonitoringService, MonitoringServiceCreateArgs};
use ms_store::BalanceProofStore;
use ms_transport::{TcpTransport, Transport, TransportIdentity};
use ms_types::{ChannelId, ChannelState, Message};

use crate::testing_tool::{
    chain::MockChain,
    common::{
        contract_address, init_log, wait_until, FailingChallenger, Participant,
        RecordingChallenger, TestContext, NETWORK_ID,
    },
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_disputes_stale_close() {
    let ctx = TestContext::setup();
    let service_task = ctx.spawn_service().await;

    let channel_id = ChannelId::from_low_u64_be(0x20);
    ctx.deliver_proof(channel_id, 3).await;
    // the reaper empties the tracker without help
    wait_until(|| ctx.service.tracker().is_empty()).await;
    assert_eq!(ctx.stored_nonce(&channel_id), Some(3));

    ctx.chain.close(channel_id, ctx.counterparty.address(), None);
    wait_until(|| !ctx.challenger.records().is_empty()).await;
    wait_until(|| {
        matches!(
            ctx.store.get(&channel_id).unwrap().map(|entry| entry.state),
            Some(ChannelState::Challenged { .. })
        )
    })
    .await;

    ctx.chain.settle(channel_id);
    wait_until(|| ctx.store.get(&channel_id).unwrap().is_none()).await;

    ctx.service.stop();
    tokio::time::timeout(Duration::from_secs(5), service_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!ctx.transport.is_started());
    assert!(ctx.monitor.is_stopped());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_fails_on_handler_error() {
    let ctx = TestContext::builder()
        .challenger(Arc::new(FailingChallenger))
        .build();
    let service_task = ctx.spawn_service().await;

    let channel_id = ChannelId::from_low_u64_be(0x21);
    ctx.deliver_proof(channel_id, 3).await;
    ctx.chain.close(channel_id, ctx.counterparty.address(), None);

    let result = tokio::time::timeout(Duration::from_secs(5), service_task)
        .await
        .unwrap()
        .unwrap();
    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("challenge rejected by node"));
    // collaborators are stopped on the way out
    assert!(!ctx.transport.is_started());
    // the failed close stays unmarked, it is redelivered after a restart
    let entry = ctx.store.get(&channel_id).unwrap().unwrap();
    assert_eq!(entry.state, ChannelState::Watched);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_over_tcp() {
    init_log();
    let protected = Participant::random();
    let counterparty = Participant::random();
    let chain = Arc::new(MockChain::default());
    let monitor = Arc::new(BlockchainMonitor::new(
        chain.clone(),
        Duration::from_millis(10),
    ));
    let transport = Arc::new(TcpTransport::new(
        TransportIdentity {
            address: protected.address(),
        },
        "127.0.0.1:0".to_string(),
        vec![],
    ));
    let store = BalanceProofStore::open_tmp().unwrap();
    let challenger = Arc::new(RecordingChallenger::default());
    let service = MonitoringService::create(MonitoringServiceCreateArgs {
        privkey: protected.privkey().to_string(),
        network_id: NETWORK_ID,
        contract_address: contract_address(),
        store: store.clone(),
        transport: transport.clone(),
        monitor,
        validator: Arc::new(NonceValidator),
        challenger: challenger.clone(),
        config: MonitorConfig {
            reap_timeout_ms: 50,
            idle_sleep_ms: 10,
        },
    })
    .unwrap();

    let service_task = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run().await })
    };
    wait_until(|| transport.local_addr().is_some()).await;
    let peer = transport.local_addr().unwrap().to_string();

    let sender = TcpTransport::new(
        TransportIdentity {
            address: counterparty.address(),
        },
        "127.0.0.1:0".to_string(),
        vec![peer],
    );
    sender.start().await.unwrap();

    let channel_id = ChannelId::from_low_u64_be(0x22);
    let valid = counterparty.sign(channel_id, protected.address(), 2, 20);
    let mut forged = counterparty.sign(channel_id, protected.address(), 9, 90);
    forged.transferred_amount = 0;
    sender
        .send_message(&Message::BalanceProof(forged))
        .await
        .unwrap();
    sender
        .send_message(&Message::BalanceProof(valid.clone()))
        .await
        .unwrap();

    wait_until(|| store.get(&channel_id).unwrap().is_some()).await;
    let entry = store.get(&channel_id).unwrap().unwrap();
    assert_eq!(entry.balance_proof, valid);

    chain.close(channel_id, counterparty.address(), None);
    wait_until(|| challenger.records().len() == 1).await;

    sender.stop().await;
    service.stop();
    tokio::time::timeout(Duration::from_secs(5), service_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
