//! HTTP client for the service's key-value contract
//!
//! - `PUT /kv/{key}` store, `GET /kv/{key}` fetch (404 = miss), `DELETE /kv/{key}`
//! - `POST /kv/{key}?op=..&field=..&val=..` partial update
//! - `GET /kv/health` liveness, `GET /metrics` counters
//!
//! Every call is bounded by the client-wide timeout. Transport failures
//! come back as `TransientNetwork` so callers can count them and move on.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, HarnessResult};

/// Partial-update operations understood by `POST /kv/{key}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    /// Set an integer field
    SetInt,
    /// Set a string field
    SetStr,
    /// Patch a string field in place
    PatchStr,
}

impl PatchOp {
    /// Query-string value
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::SetInt => "set_int",
            PatchOp::SetStr => "set_str",
            PatchOp::PatchStr => "patch_str",
        }
    }
}

/// Client for one service instance
#[derive(Debug, Clone)]
pub struct KvClient {
    http: Client,
    base: String,
    health_path: String,
    metrics_path: String,
}

impl KvClient {
    /// Build a client with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> HarnessResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
            health_path: "/kv/health".to_string(),
            metrics_path: "/metrics".to_string(),
        })
    }

    /// Build a client from harness configuration
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        let mut client = Self::new(config.base(), config.request_timeout())?;
        client.health_path = config.health_path.clone();
        client.metrics_path = config.metrics_path.clone();
        Ok(client)
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/kv/{}", self.base, key)
    }

    /// Store a JSON value
    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> HarnessResult<()> {
        let url = self.key_url(key);
        let resp = self
            .http
            .put(&url)
            .json(value)
            .send()
            .await
            .map_err(|e| HarnessError::transient(&url, e))?;
        expect_ok(&url, resp.status())
    }

    /// Fetch a value; `Ok(None)` on 404
    pub async fn get(&self, key: &str) -> HarnessResult<Option<Vec<u8>>> {
        let url = self.key_url(key);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HarnessError::transient(&url, e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| HarnessError::transient(&url, e))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(HarnessError::UnexpectedStatus {
                endpoint: url,
                status: status.as_u16(),
            }),
        }
    }

    /// Fetch a value and parse it as JSON; a non-JSON body is `Value::String`
    pub async fn get_json(&self, key: &str) -> HarnessResult<Option<Value>> {
        Ok(self.get(key).await?.map(|bytes| {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        }))
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> HarnessResult<()> {
        let url = self.key_url(key);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| HarnessError::transient(&url, e))?;
        expect_ok(&url, resp.status())
    }

    /// Partial update of one field
    pub async fn patch(&self, key: &str, op: PatchOp, field: &str, val: &str) -> HarnessResult<()> {
        let url = self.key_url(key);
        let resp = self
            .http
            .post(&url)
            .query(&[("op", op.as_str()), ("field", field), ("val", val)])
            .send()
            .await
            .map_err(|e| HarnessError::transient(&url, e))?;
        expect_ok(&url, resp.status())
    }

    /// Liveness probe; `Ok` only on 200
    pub async fn health(&self) -> HarnessResult<()> {
        let url = format!("{}{}", self.base, self.health_path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HarnessError::transient(&url, e))?;
        // Drain so the connection can be reused by the hammering tasks.
        let status = resp.status();
        let _ = resp.bytes().await;
        expect_ok(&url, status)
    }

    /// Fetch the configured metrics document
    pub async fn metrics(&self) -> HarnessResult<Value> {
        let path = self.metrics_path.clone();
        self.metrics_at(&path).await
    }

    /// Fetch a metrics document from an explicit path (`/metrics` or `/kv/metrics`)
    pub async fn metrics_at(&self, path: &str) -> HarnessResult<Value> {
        let url = format!("{}{}", self.base, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HarnessError::transient(&url, e))?;
        expect_ok(&url, resp.status())?;
        resp.json::<Value>()
            .await
            .map_err(|e| HarnessError::transient(&url, e))
    }
}

fn expect_ok(url: &str, status: StatusCode) -> HarnessResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(HarnessError::UnexpectedStatus {
            endpoint: url.to_string(),
            status: status.as_u16(),
        })
    }
}
