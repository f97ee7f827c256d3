//! [`ChainClient`] over an Ethereum JSON-RPC endpoint.
//!
//! Transactions are submitted with `eth_sendTransaction`, so the sending
//! account must be managed by the node (Hardhat/Anvil dev accounts, or a
//! node fronting an external signer).

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::{
    ChainClient, ContractArtifact, PendingTx, TxReceipt, VaultCall, abi,
    rpc::{self, DEFAULT_REQUEST_TIMEOUT},
};

/// Default time to wait for a transaction to be mined.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connection settings for [`RpcChainClient`].
#[derive(Debug, Clone)]
pub struct RpcChainClientConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Sending account. Defaults to the node's first account.
    pub from: Option<Address>,
    /// Timeout of a single RPC request.
    pub request_timeout: Duration,
    /// How long to wait for a receipt before giving up on a transaction.
    pub receipt_timeout: Duration,
    /// Interval between receipt polls.
    pub poll_interval: Duration,
}

impl RpcChainClientConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            from: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Receipt polling found nothing yet.
#[derive(Debug, Error)]
#[error("Transaction {0} is not mined yet")]
struct ReceiptPending(B256);

/// Transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(deserialize_with = "rpc::deserialize_u64_from_hex")]
    block_number: u64,
    #[serde(default)]
    contract_address: Option<Address>,
    /// Absent on pre-Byzantium chains.
    #[serde(default, deserialize_with = "rpc::deserialize_opt_u64_from_hex")]
    status: Option<u64>,
}

impl RpcReceipt {
    fn into_receipt(self) -> Result<TxReceipt> {
        if self.status == Some(0) {
            anyhow::bail!(
                "Transaction {} reverted in block {}",
                self.transaction_hash,
                self.block_number
            );
        }

        Ok(TxReceipt {
            tx_hash: self.transaction_hash,
            block_number: self.block_number,
            contract_address: self.contract_address,
        })
    }
}

/// JSON-RPC backed chain client.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    client: reqwest::Client,
    url: String,
    from: Address,
    chain_id: u64,
    bytecode: Bytes,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl RpcChainClient {
    /// Connect to the node, resolve the sending account and keep the vault
    /// creation bytecode from `artifact`.
    pub async fn connect(config: RpcChainClientConfig, artifact: ContractArtifact) -> Result<Self> {
        let client = rpc::create_client(config.request_timeout)?;
        let url = config.rpc_url.to_string();

        let chain_id = query_chain_id(&client, &url)
            .await
            .with_context(|| format!("Failed to reach {} - is the node running?", url))?;

        let from = match config.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, &url, "eth_accounts", vec![])
                        .await
                        .context("Failed to list node accounts")?;
                accounts
                    .first()
                    .copied()
                    .context("The node manages no accounts, a sending account must be given")?
            }
        };

        tracing::info!(
            rpc_url = %url,
            chain_id,
            from = %from,
            contract = %artifact.contract_name,
            "Connected to chain"
        );

        Ok(Self {
            client,
            url,
            from,
            chain_id,
            bytecode: artifact.bytecode,
            receipt_timeout: config.receipt_timeout,
            poll_interval: config.poll_interval,
        })
    }

    /// The account transactions are sent from.
    pub fn from_address(&self) -> Address {
        self.from
    }

    /// Chain id reported by the node on connect.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn send_transaction(&self, to: Option<Address>, data: Bytes) -> Result<PendingTx> {
        let tx = transaction_request(self.from, to, &data);

        let tx_hash: B256 =
            rpc::json_rpc_call(&self.client, &self.url, "eth_sendTransaction", vec![tx])
                .await
                .context("Failed to send transaction")?;

        tracing::debug!(tx_hash = %tx_hash, to = ?to, "Transaction submitted");

        Ok(PendingTx { tx_hash })
    }

    async fn fetch_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        let receipt: Option<RpcReceipt> = rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await?;

        match receipt {
            Some(receipt) => receipt.into_receipt(),
            None => Err(ReceiptPending(tx_hash).into()),
        }
    }
}

impl ChainClient for RpcChainClient {
    async fn deploy(&self, admin: Address, treasury: Address) -> Result<PendingTx> {
        let data = abi::encode_deploy(&self.bytecode, admin, treasury);
        self.send_transaction(None, data)
            .await
            .context("Failed to submit vault deployment")
    }

    async fn call(&self, vault: Address, call: &VaultCall) -> Result<PendingTx> {
        let data = match call {
            VaultCall::SetAaveProvider { provider } => abi::encode_set_aave_provider(*provider),
            VaultCall::ListAsset {
                asset,
                minimum,
                enabled,
            } => abi::encode_list_asset(*asset, *minimum, *enabled),
        };

        self.send_transaction(Some(vault), data)
            .await
            .with_context(|| format!("Failed to submit {}", call.method()))
    }

    async fn wait(&self, tx: &PendingTx) -> Result<TxReceipt> {
        let max_polls = poll_count(self.receipt_timeout, self.poll_interval);

        let result = (|| self.fetch_receipt(tx.tx_hash))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(max_polls),
            )
            .sleep(tokio::time::sleep)
            .when(|e: &anyhow::Error| e.downcast_ref::<ReceiptPending>().is_some())
            .notify(|e: &anyhow::Error, delay: Duration| {
                tracing::trace!(error = %e, delay = ?delay, "Receipt not available, retrying...");
            })
            .await;

        match result {
            Ok(receipt) => Ok(receipt),
            Err(e) if e.downcast_ref::<ReceiptPending>().is_some() => Err(anyhow::anyhow!(
                "Timeout waiting for receipt of {} after {:?}",
                tx.tx_hash,
                self.receipt_timeout
            )),
            Err(e) => Err(e.context(format!("Failed to confirm transaction {}", tx.tx_hash))),
        }
    }
}

/// Build the `eth_sendTransaction` request object. `to` is omitted for
/// contract creation.
fn transaction_request(from: Address, to: Option<Address>, data: &Bytes) -> Value {
    let mut tx = serde_json::json!({
        "from": from,
        "data": data,
    });
    if let Some(to) = to {
        tx["to"] = serde_json::json!(to);
    }
    tx
}

/// Number of receipt polls that fit in `timeout`; at least one.
fn poll_count(timeout: Duration, interval: Duration) -> usize {
    let interval_ms = interval.as_millis().max(1);
    ((timeout.as_millis() / interval_ms) as usize).max(1)
}

async fn query_chain_id(client: &reqwest::Client, url: &str) -> Result<u64> {
    let chain_id: String = rpc::json_rpc_call(client, url, "eth_chainId", vec![]).await?;
    u64::from_str_radix(chain_id.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid chain id: {}", chain_id))
}

#[cfg(test)]
mod tests {
    use std::{
        str::FromStr,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use tokio::{
        io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
        net::{TcpListener, TcpStream},
    };

    use super::*;

    const FROM: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const VAULT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

    #[test]
    fn test_transaction_request_call() {
        let tx = transaction_request(
            Address::from_str(FROM).unwrap(),
            Some(Address::from_str(VAULT).unwrap()),
            &Bytes::from(vec![0xab, 0xcd]),
        );

        assert_eq!(tx["from"].as_str().unwrap().to_lowercase(), FROM.to_lowercase());
        assert_eq!(tx["to"].as_str().unwrap().to_lowercase(), VAULT.to_lowercase());
        assert_eq!(tx["data"], "0xabcd");
    }

    #[test]
    fn test_transaction_request_deploy_has_no_recipient() {
        let tx = transaction_request(Address::from_str(FROM).unwrap(), None, &Bytes::new());
        assert!(tx.get("to").is_none());
    }

    #[test]
    fn test_receipt_success() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": HASH,
            "blockNumber": "0x2",
            "contractAddress": VAULT,
            "status": "0x1",
            "gasUsed": "0x5208"
        }))
        .unwrap();

        let receipt = receipt.into_receipt().unwrap();
        assert_eq!(receipt.tx_hash, B256::from_str(HASH).unwrap());
        assert_eq!(receipt.block_number, 2);
        assert_eq!(receipt.contract_address, Some(Address::from_str(VAULT).unwrap()));
    }

    #[test]
    fn test_receipt_reverted() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": HASH,
            "blockNumber": "0x3",
            "contractAddress": null,
            "status": "0x0"
        }))
        .unwrap();

        let err = receipt.into_receipt().unwrap_err();
        assert!(err.to_string().contains("reverted in block 3"));
    }

    #[test]
    fn test_receipt_without_status() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": HASH,
            "blockNumber": "0x1"
        }))
        .unwrap();

        let receipt = receipt.into_receipt().unwrap();
        assert_eq!(receipt.contract_address, None);
    }

    #[test]
    fn test_poll_count() {
        assert_eq!(
            poll_count(Duration::from_secs(120), Duration::from_secs(1)),
            120
        );
        assert_eq!(
            poll_count(Duration::from_millis(100), Duration::from_secs(1)),
            1
        );
        assert_eq!(poll_count(Duration::from_secs(1), Duration::ZERO), 1000);
    }

    /// JSON-RPC node answering the n-th request with the n-th response; the
    /// last response repeats. Returns the endpoint and a request counter.
    async fn spawn_node(responses: Vec<Value>) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_connection(stream, responses.clone(), counter.clone()));
            }
        });

        (url, requests)
    }

    async fn serve_connection(stream: TcpStream, responses: Vec<Value>, counter: Arc<AtomicUsize>) {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        loop {
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }

            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).await.unwrap();

            let index = counter.fetch_add(1, Ordering::SeqCst);
            let mut response = responses[index.min(responses.len() - 1)].clone();
            response["jsonrpc"] = serde_json::json!("2.0");
            response["id"] = serde_json::json!(1);

            let payload = response.to_string();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                payload.len()
            );
            write.write_all(head.as_bytes()).await.unwrap();
            write.write_all(payload.as_bytes()).await.unwrap();
        }
    }

    fn client_for(url: &Url, receipt_timeout: Duration) -> RpcChainClient {
        RpcChainClient {
            client: rpc::create_client(Duration::from_secs(5)).unwrap(),
            url: url.to_string(),
            from: Address::from_str(FROM).unwrap(),
            chain_id: 31337,
            bytecode: Bytes::new(),
            receipt_timeout,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn pending() -> PendingTx {
        PendingTx {
            tx_hash: B256::from_str(HASH).unwrap(),
        }
    }

    fn mined_receipt() -> Value {
        serde_json::json!({
            "result": {
                "transactionHash": HASH,
                "blockNumber": "0x5",
                "contractAddress": VAULT,
                "status": "0x1"
            }
        })
    }

    #[tokio::test]
    async fn test_connect_resolves_chain_and_sender() {
        let (url, requests) = spawn_node(vec![
            serde_json::json!({ "result": "0x7a69" }),
            serde_json::json!({ "result": [FROM] }),
        ])
        .await;

        let artifact = ContractArtifact {
            contract_name: "WarrenWalletMulti".to_string(),
            bytecode: Bytes::from(vec![0x60, 0x80]),
        };
        let client = RpcChainClient::connect(RpcChainClientConfig::new(url), artifact)
            .await
            .unwrap();

        assert_eq!(client.chain_id(), 31337);
        assert_eq!(client.from_address(), Address::from_str(FROM).unwrap());
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_polls_until_mined() {
        let (url, requests) = spawn_node(vec![
            serde_json::json!({ "result": null }),
            serde_json::json!({ "result": null }),
            mined_receipt(),
        ])
        .await;
        let client = client_for(&url, Duration::from_secs(5));

        let receipt = client.wait(&pending()).await.unwrap();

        assert_eq!(receipt.block_number, 5);
        assert_eq!(receipt.contract_address, Some(Address::from_str(VAULT).unwrap()));
        assert_eq!(requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_times_out_when_never_mined() {
        let (url, requests) = spawn_node(vec![serde_json::json!({ "result": null })]).await;
        let client = client_for(&url, Duration::from_millis(50));

        let err = client.wait(&pending()).await.unwrap_err();

        assert!(err.to_string().contains("Timeout waiting for receipt"));
        assert!(requests.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_wait_does_not_retry_rpc_errors() {
        let (url, requests) = spawn_node(vec![serde_json::json!({
            "error": { "code": -32000, "message": "header not found" }
        })])
        .await;
        let client = client_for(&url, Duration::from_secs(5));

        let err = client.wait(&pending()).await.unwrap_err();
        let message = format!("{err:#}");

        assert!(message.contains("Failed to confirm transaction"));
        assert!(message.contains("header not found"));
        assert!(!message.contains("Timeout"));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }
}
