//! JSON-RPC ledger gateway client.
//!
//! Speaks JSON-RPC 2.0 over HTTP to a single ledger gateway:
//! - `ledger_getAccount`, `ledger_getMint`, `ledger_accountExists`
//! - `ledger_listHoldingAccounts`
//! - `ledger_submit`, which blocks until the instruction is confirmed or
//!   rejected
//!
//! Rejections arrive as JSON-RPC errors with codes in the
//! `-32010..=-32019` range and are mapped to [`RejectionKind`]; the message
//! is kept verbatim for operators. There is no failover or retry.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;

use cinder_supply::{
    address::Address,
    authority::TxSignature,
    instruction::SignedInstruction,
    ledger::{
        AccountState, Ledger, LedgerError, MintState, Rejection, RejectionKind, Submission,
    },
};

/// HTTP timeout for reads. Submissions are bounded by the engine's
/// confirmation timeout instead.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// The structured rejection this error carries, if it is one.
    pub fn rejection(&self) -> Option<Rejection> {
        RejectionKind::from_code(self.code).map(|kind| Rejection::new(kind, self.message.clone()))
    }

    fn into_ledger_error(self, method: &str) -> LedgerError {
        LedgerError::Transport(format!(
            "{} failed: RPC error {}: {}",
            method, self.code, self.message
        ))
    }
}

/// Result of `ledger_submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    pub signature: TxSignature,
}

/// Ledger accessor backed by a JSON-RPC gateway.
#[derive(Debug, Clone)]
pub struct GatewayLedger {
    client: reqwest::Client,
    url: String,
}

impl GatewayLedger {
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make one call. The outer error is a transport failure; the inner
    /// one is the gateway's JSON-RPC error.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Result<T, JsonRpcError>, LedgerError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        debug!("RPC {} #{} -> {}", method, id, self.url);
        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Malformed(format!("{}: {}", method, e)))?;

        if let Some(error) = body.error {
            return Ok(Err(error));
        }
        body.result
            .map(Ok)
            .ok_or_else(|| LedgerError::Malformed(format!("missing result in {} response", method)))
    }

    async fn read<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Result<T, JsonRpcError>, LedgerError> {
        self.call(method, params, Some(READ_TIMEOUT)).await
    }
}

fn is_not_found(error: &JsonRpcError) -> bool {
    RejectionKind::from_code(error.code) == Some(RejectionKind::AccountNotFound)
}

#[async_trait]
impl Ledger for GatewayLedger {
    async fn read_account(&self, address: &Address) -> Result<AccountState, LedgerError> {
        const METHOD: &str = "ledger_getAccount";
        match self.read(METHOD, json!({ "address": address })).await? {
            Ok(state) => Ok(state),
            Err(e) if is_not_found(&e) => Err(LedgerError::AccountNotFound(*address)),
            Err(e) => Err(e.into_ledger_error(METHOD)),
        }
    }

    async fn read_mint(&self, address: &Address) -> Result<MintState, LedgerError> {
        const METHOD: &str = "ledger_getMint";
        match self.read(METHOD, json!({ "address": address })).await? {
            Ok(state) => Ok(state),
            Err(e) if is_not_found(&e) => Err(LedgerError::MintNotFound(*address)),
            Err(e) => Err(e.into_ledger_error(METHOD)),
        }
    }

    async fn account_exists(&self, address: &Address) -> Result<bool, LedgerError> {
        const METHOD: &str = "ledger_accountExists";
        self.read(METHOD, json!({ "address": address }))
            .await?
            .map_err(|e| e.into_ledger_error(METHOD))
    }

    async fn list_holding_accounts(
        &self,
        mint: &Address,
    ) -> Result<Vec<AccountState>, LedgerError> {
        const METHOD: &str = "ledger_listHoldingAccounts";
        self.read(METHOD, json!({ "mint": mint }))
            .await?
            .map_err(|e| e.into_ledger_error(METHOD))
    }

    async fn submit(&self, instruction: SignedInstruction) -> Result<Submission, LedgerError> {
        const METHOD: &str = "ledger_submit";
        let outcome = self
            .call::<SubmitResult>(METHOD, json!({ "instruction": instruction }), None)
            .await?;
        match outcome {
            Ok(result) => Ok(Submission::Confirmed(result.signature)),
            Err(e) => match e.rejection() {
                Some(rejection) => Ok(Submission::Rejected(rejection)),
                None => Err(e.into_ledger_error(METHOD)),
            },
        }
    }
}
