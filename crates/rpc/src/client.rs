//! JSON-RPC client facade.
//!
//! One `EthClient` per endpoint; every component of the engine borrows the
//! client immutably and never caches node responses beyond a single
//! operation. Individual request failures are fatal for the operation in
//! flight: there is no transport-level retry.

use bytes::Bytes;
use chainmirror_common::types::BlockIdentifier;
use ethereum_types::{Address, H256, U64, U256};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use tracing::trace;
use url::Url;

use crate::errors::EthClientError;
use crate::types::{
    GetProofBundle, RpcBlock, RpcReceipt, RpcResponse, RpcTransaction, TraceReplay,
};

/// Default bound on in-flight requests per pipeline stage.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 50;

#[derive(Debug, Clone)]
pub struct EthClient {
    client: reqwest::Client,
    url: Url,
    api_key: Option<String>,
    max_in_flight: usize,
}

impl EthClient {
    pub fn new(url: &str) -> Result<Self, EthClientError> {
        Self::new_with_config(url, None, DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn new_with_config(
        url: &str,
        api_key: Option<String>,
        max_in_flight: usize,
    ) -> Result<Self, EthClientError> {
        let url = Url::parse(url).map_err(|e| EthClientError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            max_in_flight: max_in_flight.max(1),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, EthClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        trace!(%method, "rpc request");

        let mut request = self.client.post(self.url.clone()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response: RpcResponse = request
            .send()
            .await
            .map_err(|e| EthClientError::Http {
                method: method.to_string(),
                cause: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| EthClientError::Parse {
                method: method.to_string(),
                cause: e.to_string(),
            })?;

        match response {
            RpcResponse::Success(success) => Ok(success.result),
            RpcResponse::Error(error) => Err(EthClientError::Rpc {
                method: method.to_string(),
                code: error.error.code,
                message: error.error.message,
            }),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, EthClientError> {
        let result = self.send_request(method, params).await?;
        serde_json::from_value(result).map_err(|e| EthClientError::Parse {
            method: method.to_string(),
            cause: e.to_string(),
        })
    }

    /// Run `f` over `items` with at most `max_in_flight` requests
    /// outstanding. Results come back in input-issue order regardless of
    /// completion order; the first failure aborts the whole batch.
    pub async fn batch<I, T, F, Fut>(&self, items: I, f: F) -> Result<Vec<T>, EthClientError>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, EthClientError>>,
    {
        stream::iter(items.into_iter().map(f))
            .buffered(self.max_in_flight)
            .try_collect()
            .await
    }

    pub async fn get_block_by_number(
        &self,
        block: BlockIdentifier,
        hydrated: bool,
    ) -> Result<RpcBlock, EthClientError> {
        let result: Option<RpcBlock> = self
            .request(
                "eth_getBlockByNumber",
                json!([block.as_param(), hydrated]),
            )
            .await?;
        result.ok_or_else(|| EthClientError::Rpc {
            method: "eth_getBlockByNumber".to_string(),
            code: -32000,
            message: format!("block {block} not found"),
        })
    }

    pub async fn get_transaction_by_hash(
        &self,
        hash: H256,
    ) -> Result<RpcTransaction, EthClientError> {
        let result: Option<RpcTransaction> = self
            .request("eth_getTransactionByHash", json!([format!("{hash:#x}")]))
            .await?;
        result.ok_or_else(|| EthClientError::Rpc {
            method: "eth_getTransactionByHash".to_string(),
            code: -32000,
            message: format!("transaction {hash:#x} not found"),
        })
    }

    pub async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<RpcReceipt>, EthClientError> {
        self.request("eth_getTransactionReceipt", json!([format!("{hash:#x}")]))
            .await
    }

    pub async fn get_code(
        &self,
        address: Address,
        block: BlockIdentifier,
    ) -> Result<Bytes, EthClientError> {
        let result: String = self
            .request(
                "eth_getCode",
                json!([format!("{address:#x}"), block.as_param()]),
            )
            .await?;
        let bytes =
            hex::decode(result.trim_start_matches("0x")).map_err(|e| EthClientError::Parse {
                method: "eth_getCode".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Bytes::from(bytes))
    }

    pub async fn get_storage_at(
        &self,
        address: Address,
        key: H256,
        block: BlockIdentifier,
    ) -> Result<U256, EthClientError> {
        self.request(
            "eth_getStorageAt",
            json!([
                format!("{address:#x}"),
                format!("{key:#x}"),
                block.as_param()
            ]),
        )
        .await
    }

    pub async fn get_proof(
        &self,
        address: Address,
        storage_keys: &[H256],
        block: BlockIdentifier,
    ) -> Result<GetProofBundle, EthClientError> {
        let keys: Vec<String> = storage_keys.iter().map(|k| format!("{k:#x}")).collect();
        self.request(
            "eth_getProof",
            json!([format!("{address:#x}"), keys, block.as_param()]),
        )
        .await
    }

    /// Parity extension: up to `count` storage keys of `address` in trie
    /// pre-order, strictly after `offset` (from the smallest key when
    /// `offset` is `None`), pinned to `block`.
    pub async fn list_storage_keys(
        &self,
        address: Address,
        count: usize,
        offset: Option<H256>,
        block: BlockIdentifier,
    ) -> Result<Vec<H256>, EthClientError> {
        let offset = match offset {
            Some(key) => json!(format!("{key:#x}")),
            None => Value::Null,
        };
        let result: Option<Vec<H256>> = self
            .request(
                "parity_listStorageKeys",
                json!([format!("{address:#x}"), count, offset, block.as_param()]),
            )
            .await?;
        Ok(result.unwrap_or_default())
    }

    pub async fn trace_replay_transaction(
        &self,
        hash: H256,
    ) -> Result<TraceReplay, EthClientError> {
        self.request(
            "trace_replayTransaction",
            json!([format!("{hash:#x}"), ["stateDiff"]]),
        )
        .await
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, EthClientError> {
        self.request(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    /// Node-signed submission for unlocked accounts.
    pub async fn send_transaction(
        &self,
        from: Address,
        to: Option<Address>,
        value: U256,
        data: &[u8],
        gas_limit: u64,
        gas_price: U256,
    ) -> Result<H256, EthClientError> {
        let mut tx = json!({
            "from": format!("{from:#x}"),
            "value": format!("{value:#x}"),
            "data": format!("0x{}", hex::encode(data)),
            "gas": format!("{gas_limit:#x}"),
            "gasPrice": format!("{gas_price:#x}"),
        });
        if let Some(to) = to {
            tx["to"] = json!(format!("{to:#x}"));
        }
        self.request("eth_sendTransaction", json!([tx])).await
    }

    pub async fn call(
        &self,
        to: Address,
        data: &[u8],
        block: BlockIdentifier,
    ) -> Result<Bytes, EthClientError> {
        let result: String = self
            .request(
                "eth_call",
                json!([
                    {
                        "to": format!("{to:#x}"),
                        "data": format!("0x{}", hex::encode(data)),
                    },
                    block.as_param()
                ]),
            )
            .await?;
        let bytes =
            hex::decode(result.trim_start_matches("0x")).map_err(|e| EthClientError::Parse {
                method: "eth_call".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Bytes::from(bytes))
    }

    pub async fn block_number(&self) -> Result<u64, EthClientError> {
        let number: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(number.as_u64())
    }

    pub async fn chain_id(&self) -> Result<u64, EthClientError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.as_u64())
    }

    pub async fn gas_price(&self) -> Result<U256, EthClientError> {
        self.request("eth_gasPrice", json!([])).await
    }

    pub async fn get_nonce(
        &self,
        address: Address,
        block: BlockIdentifier,
    ) -> Result<u64, EthClientError> {
        let nonce: U64 = self
            .request(
                "eth_getTransactionCount",
                json!([format!("{address:#x}"), block.as_param()]),
            )
            .await?;
        Ok(nonce.as_u64())
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, EthClientError> {
        self.request("eth_accounts", json!([])).await
    }
}
