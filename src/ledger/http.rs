//! HTTP client for the contractor service
//!
//! Every endpoint takes a JSON body and answers with a JSON object that
//! either carries the result fields or an `error` message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    bounded, classify_failure, LedgerGateway, PublishRequest, PurchaseReceipt, PurchaseRequest,
};
use crate::auth::ParticipantRole;
use crate::types::{LibraryError, Result};

#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    /// Base URL of the contractor service
    pub base_url: String,
    /// Budget for each call
    pub timeout: Duration,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5305".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpLedgerGateway {
    config: LedgerClientConfig,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Deserialize, Default)]
struct TxReply {
    #[serde(default)]
    tx_hash: String,
}

#[derive(Deserialize, Default)]
struct RoleReply {
    role: Option<i64>,
}

#[derive(Serialize)]
struct AccountRequest<'a> {
    address: &'a str,
}

#[derive(Serialize)]
struct FaucetRequest<'a> {
    address: &'a str,
    amount: &'a str,
}

impl HttpLedgerGateway {
    pub fn new(config: LedgerClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LibraryError::Config(format!("Failed to build ledger client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned + Send>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        let call = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if !status.is_success() {
                warn!("Ledger {} returned HTTP {}: {}", operation, status, text);
                return Err(classify_failure(format!("{operation}: HTTP {status}: {text}")));
            }

            let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
                LibraryError::Ledger(format!("{operation}: malformed reply: {e}"))
            })?;
            match envelope.error {
                Some(message) if !message.is_empty() => Err(classify_failure(message)),
                _ => Ok(envelope.body),
            }
        };

        bounded(self.config.timeout, operation, call).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!("Ledger call {}", path);
        self.send(self.http_client.post(self.url(path)).json(body), path)
            .await
    }
}

#[async_trait::async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn purchase_work(&self, request: &PurchaseRequest) -> Result<PurchaseReceipt> {
        self.post("purchase_work", request).await
    }

    async fn add_participant(&self, address: &str) -> Result<String> {
        let reply: TxReply = self
            .post("add_participant", &AccountRequest { address })
            .await?;
        Ok(reply.tx_hash)
    }

    async fn make_author(&self, address: &str) -> Result<String> {
        let reply: TxReply = self.post("make_author", &AccountRequest { address }).await?;
        Ok(reply.tx_hash)
    }

    async fn make_reviewer(&self, address: &str) -> Result<String> {
        let reply: TxReply = self
            .post("make_reviewer", &AccountRequest { address })
            .await?;
        Ok(reply.tx_hash)
    }

    async fn publish_work(&self, request: &PublishRequest) -> Result<String> {
        let reply: TxReply = self.post("publish_work", request).await?;
        Ok(reply.tx_hash)
    }

    async fn faucet(&self, address: &str, amount: &str) -> Result<String> {
        let reply: TxReply = self
            .post("faucet", &FaucetRequest { address, amount })
            .await?;
        Ok(reply.tx_hash)
    }

    async fn participant_role(&self, address: &str) -> Result<Option<ParticipantRole>> {
        let path = format!("participant_role/{}", urlencoding::encode(address));
        let reply: RoleReply = self
            .send(self.http_client.get(self.url(&path)), "participant_role")
            .await?;
        Ok(reply.role.and_then(ParticipantRole::from_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = HttpLedgerGateway::new(LedgerClientConfig {
            base_url: "http://contractor:5305/".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(
            client.url("purchase_work"),
            "http://contractor:5305/purchase_work"
        );
    }

    #[test]
    fn test_envelope_with_error() {
        let reply: Envelope<TxReply> =
            serde_json::from_str(r#"{"error": "insufficient funds"}"#).unwrap();
        assert_eq!(reply.error.as_deref(), Some("insufficient funds"));
        assert!(reply.body.tx_hash.is_empty());

        let ok: Envelope<PurchaseReceipt> =
            serde_json::from_str(r#"{"reader_tx_hash": "0x1", "author_tx_hash": "0x2"}"#)
                .unwrap();
        assert!(ok.error.is_none());
        assert_eq!(ok.body.author_tx_hash, "0x2");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_upstream_failure() {
        let client = HttpLedgerGateway::new(LedgerClientConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();
        let result = client.make_author("0xabc").await;
        assert!(matches!(result, Err(LibraryError::Ledger(_))));
    }
}
