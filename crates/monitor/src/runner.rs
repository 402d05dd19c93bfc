use std::{fs, net::SocketAddr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use ms_chain::BlockchainMonitor;
use ms_challenge::{challenger, validator};
use ms_config::Config;
use ms_rpc_client::{eth_client::EthClient, traits::ChainClient};
use ms_rpc_server::bind_rest_server;
use ms_store::BalanceProofStore;
use ms_transport::{LocalTransport, TcpTransport, Transport, TransportIdentity};
use ms_utils::wallet::privkey_to_addr;
use tokio::{sync::broadcast, task::JoinError};

use crate::service::{MonitoringService, MonitoringServiceCreateArgs};

pub async fn run(config: Config) -> Result<()> {
    let privkey = fs::read_to_string(&config.wallet.privkey_path).with_context(|| {
        format!(
            "read wallet privkey {}",
            config.wallet.privkey_path.to_string_lossy()
        )
    })?;
    let address = privkey_to_addr(&privkey)?;

    let store = BalanceProofStore::from_config(&config.store)?;
    let client: Arc<dyn ChainClient> = Arc::new(EthClient::with_url(&config.blockchain.rpc_url)?);
    let monitor = Arc::new(BlockchainMonitor::from_config(
        Arc::clone(&client),
        &config.blockchain,
    ));

    let identity = TransportIdentity { address };
    let transport: Arc<dyn Transport> = match TcpTransport::from_config(identity, &config.transport)
    {
        Some(tcp) => Arc::new(tcp),
        None => {
            log::warn!("config.transport.listen is unset, using loopback transport");
            Arc::new(LocalTransport::new(identity))
        }
    };

    let args = MonitoringServiceCreateArgs {
        privkey,
        network_id: config.network_id,
        contract_address: config.contract_address,
        store: store.clone(),
        transport,
        monitor,
        validator: validator::from_policy(config.validation),
        challenger: challenger::from_mode(config.challenge, client, address),
        config: config.monitor.clone(),
    };
    let service = MonitoringService::create(args)?;
    log::info!(
        "monitoring service for network {} contract {}, validation {:?}, challenge {:?}",
        config.network_id,
        config.contract_address,
        config.validation,
        config.challenge
    );

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let listen_addr: SocketAddr = config
        .rpc_server
        .listen
        .parse()
        .with_context(|| format!("parse REST listen address {}", config.rpc_server.listen))?;
    let (_, rest_server) = bind_rest_server(&listen_addr, store.clone(), async move {
        let _ = shutdown_rx.recv().await;
    })?;
    let mut rest_task = tokio::spawn(rest_server);
    let mut service_task = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run().await })
    };

    let mut service_done = false;
    let mut rest_done = false;
    let result = tokio::select! {
        signal = sigint_or_sigterm() => signal,
        joined = &mut service_task => {
            service_done = true;
            flatten("monitoring service", joined)
        }
        joined = &mut rest_task => {
            rest_done = true;
            flatten("REST server", joined)
        }
    };

    // If any task is out of running, shut down the rest in order.
    log::info!("send shutdown event");
    service.stop();
    if !service_done {
        if let Err(err) = flatten("monitoring service", service_task.await) {
            log::error!("{:#}", err);
        }
    }
    if let Err(err) = shutdown_tx.send(()) {
        log::error!("Failed to broadcast shutdown event: {:?}", err);
    }
    if !rest_done {
        if let Err(err) = flatten("REST server", rest_task.await) {
            log::error!("{:#}", err);
        }
    }
    store.flush()?;
    log::info!("Exiting...");
    result
}

fn flatten(name: &str, joined: Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result.with_context(|| format!("{} exited", name)),
        Err(err) => Err(anyhow!("{} task: {}", name, err)),
    }
}

async fn sigint_or_sigterm() -> Result<()> {
    let int = tokio::signal::ctrl_c();
    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("creating SIGTERM stream")?;
    #[cfg(unix)]
    tokio::select! {
        signal = int => signal?,
        _ = term.recv() => {}
    }
    #[cfg(not(unix))]
    int.await?;

    log::info!("received sigint or sigterm, shutting down");
    Ok(())
}
