//! HTTP client for the node REST API and the explorer backend

use super::{NodeClient, NodeError, SubmitResult, TxStatus};
use crate::network::{HealthProbe, Network};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct NodeVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerInfos {
    release_version: String,
}

/// reqwest-based client shared by health probes, tracking and submission
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: reqwest::Client,
}

impl HttpNodeClient {
    /// Create a client whose requests fail after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, NodeError> {
        let response = self.client.get(url).send().await?;
        decode(response).await
    }
}

/// Join an API path onto a configured base URL, keeping any base path
fn endpoint(base: &str, path: &str) -> Result<Url, NodeError> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| NodeError::InvalidUrl(format!("{}: {}", joined, e)))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NodeError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        return Err(NodeError::Response {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&text).map_err(|e| NodeError::Decode(e.to_string()))
}

#[async_trait]
impl HealthProbe for HttpNodeClient {
    async fn node_version(&self, network: &Network) -> Result<String, NodeError> {
        let url = endpoint(&network.node_url, "infos/version")?;
        let version: NodeVersion = self.get_json(url).await?;
        Ok(version.version)
    }

    async fn explorer_version(&self, network: &Network) -> Result<String, NodeError> {
        let url = endpoint(&network.explorer_api_url, "infos")?;
        let infos: ExplorerInfos = self.get_json(url).await?;
        Ok(infos.release_version)
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn transaction_status(
        &self,
        network: &Network,
        tx_id: &str,
    ) -> Result<TxStatus, NodeError> {
        let mut url = endpoint(&network.node_url, "transactions/status")?;
        url.query_pairs_mut().append_pair("txId", tx_id);
        self.get_json(url).await
    }

    async fn submit_transaction(
        &self,
        network: &Network,
        unsigned_tx: &str,
        signature: &str,
    ) -> Result<SubmitResult, NodeError> {
        let url = endpoint(&network.node_url, "transactions/submit")?;
        let response = self
            .client
            .post(url)
            .json(&json!({
                "unsignedTx": unsigned_tx,
                "signature": signature,
            }))
            .send()
            .await?;
        decode(response).await
    }
}
