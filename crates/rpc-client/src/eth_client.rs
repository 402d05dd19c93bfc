use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ms_types::H256;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    error::RPCRequestError,
    traits::ChainClient,
    types::{Log, LogFilter, TransactionRequest},
    utils::{parse_hex_data, parse_quantity, DEFAULT_HTTP_TIMEOUT},
};

const CLIENT_NAME: &str = "eth client";

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Ethereum JSON-RPC over HTTP.
pub struct EthClient {
    url: String,
    client: reqwest::Client,
    id: AtomicU64,
}

impl EthClient {
    pub fn with_url(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;
        Ok(EthClient {
            url: url.to_string(),
            client,
            id: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(target = "ms-rpc-client", skip_all, err, fields(method))]
    async fn request_value(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let map_err = |err: reqwest::Error| RPCRequestError::new(CLIENT_NAME, method.to_string(), err);
        let response: JsonRpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)?;
        match (response.result, response.error) {
            (_, Some(err)) => Err(RPCRequestError::new(
                CLIENT_NAME,
                method.to_string(),
                anyhow!("code: {} message: {}", err.code, err.message),
            )
            .into()),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.request_value(method, params).await?;
        let response_str = value.to_string();
        match serde_json::from_value(value) {
            Ok(r) => Ok(r),
            Err(err) => {
                log::error!(
                    "[eth-client] Failed to parse response, method: {}, response: {}",
                    method,
                    response_str
                );
                Err(err.into())
            }
        }
    }
}

/// Malformed logs are skipped, one bad log must not stall the whole range.
fn parse_logs(logs: Vec<Value>) -> Vec<Log> {
    logs.into_iter()
        .filter_map(|value| {
            let raw = value.to_string();
            match Log::from_json(value) {
                Ok(log) => Some(log),
                Err(err) => {
                    log::warn!("[eth-client] skip malformed log {}: {}", raw, err);
                    None
                }
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct RawTransaction {
    input: String,
}

#[async_trait]
impl ChainClient for EthClient {
    async fn block_number(&self) -> Result<u64> {
        let number: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&number)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let logs: Vec<Value> = self
            .request("eth_getLogs", json!([filter.to_json()]))
            .await?;
        Ok(parse_logs(logs))
    }

    async fn get_transaction_input(&self, tx_hash: &H256) -> Result<Option<Vec<u8>>> {
        let tx: Option<RawTransaction> = self
            .request(
                "eth_getTransactionByHash",
                json!([format!("{:#x}", tx_hash)]),
            )
            .await?;
        tx.map(|tx| parse_hex_data(&tx.input)).transpose()
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256> {
        self.request("eth_sendTransaction", json!([tx.to_json()]))
            .await
    }
}
