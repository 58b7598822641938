//! # HTTP client for the remote bakery service.
//!
//! Endpoints (relative to `base_url`):
//! ```text
//! GET  /hc/hardware_init?bakery_id={id}  → {"<item>": <cook seconds>, ...}
//! POST /hc/new_customer                  ← {bakery_id, bread_requirements: {"<item>": qty}}
//!                                        → {customer_ticket_id | customer_id}
//! PUT  /hc/nt                            ← {bakery_id, customer_ticket_id}
//!                                        → {current_ticket_id?, skipped_customer?, current_user_detail?}
//! GET  /hc/ct/{id}                       → {current_ticket_id?, current_user_detail?}
//! PUT  /hc/ct/st                         ← {bakery_id, customer_ticket_id}
//! ```
//! Every request carries `Authorization: Bearer <token>`. Item keys that are
//! not integers and item lines beyond `catalog_capacity` are ignored.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{AdvanceOutcome, BakeryApi, ItemId, Quantities, Ticket, TicketId};
use crate::config::Config;
use crate::error::{ApiError, ConfigError};

/// Connection settings of [`HttpBakeryApi`].
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Service base URL, without trailing slash.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
    /// Device (bakery) identifier.
    pub device_id: String,
    /// Timeout of regular calls.
    pub timeout: Duration,
    /// Timeout of catalog fetches.
    pub catalog_timeout: Duration,
    /// Maximum item kinds accepted per response.
    pub catalog_capacity: usize,
}

impl From<&Config> for HttpApiConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            token: cfg.api_token.clone(),
            device_id: cfg.device_id.clone(),
            timeout: cfg.http_timeout,
            catalog_timeout: cfg.init_http_timeout,
            catalog_capacity: cfg.catalog_capacity,
        }
    }
}

/// [`BakeryApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpBakeryApi {
    client: Client,
    cfg: HttpApiConfig,
}

impl HttpBakeryApi {
    /// Builds the client; fails on an unusable token.
    pub fn new(cfg: HttpApiConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        if !cfg.token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", cfg.token)).map_err(|e| {
                ConfigError::Invalid {
                    field: "api_token",
                    reason: e.to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .user_agent(format!("ticketvisor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "api_base_url",
                reason: e.to_string(),
            })?;

        tracing::info!(
            base_url = %cfg.base_url,
            device_id = %cfg.device_id,
            timeout_ms = cfg.timeout.as_millis() as u64,
            "created bakery api client"
        );
        Ok(Self { client, cfg })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url, path)
    }

    /// Device id as sent in bodies: a number when it is numeric.
    fn bakery_id(&self) -> Value {
        match self.cfg.device_id.parse::<u64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(self.cfg.device_id.clone()),
        }
    }

    fn ticket_body(&self, ticket: TicketId) -> Value {
        json!({ "bakery_id": self.bakery_id(), "customer_ticket_id": ticket })
    }

    async fn send(&self, req: RequestBuilder) -> Result<String, ApiError> {
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

#[derive(Debug, Deserialize)]
struct NewCustomerResponse {
    #[serde(alias = "customer_id")]
    customer_ticket_id: Option<TicketId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TicketResponse {
    current_ticket_id: Option<i64>,
    skipped_customer: bool,
    current_user_detail: Option<Value>,
}

#[async_trait]
impl BakeryApi for HttpBakeryApi {
    async fn fetch_catalog(&self) -> Result<Vec<(ItemId, u32)>, ApiError> {
        let req = self
            .client
            .get(self.url("/hc/hardware_init"))
            .query(&[("bakery_id", self.cfg.device_id.as_str())])
            .timeout(self.cfg.catalog_timeout);
        let body = self.send(req).await?;
        parse_catalog(&body, self.cfg.catalog_capacity)
    }

    async fn new_customer(&self, quantities: &Quantities) -> Result<TicketId, ApiError> {
        let requirements: Map<String, Value> = quantities
            .iter()
            .map(|(item, qty)| (item.to_string(), Value::from(*qty)))
            .collect();
        let body = json!({ "bakery_id": self.bakery_id(), "bread_requirements": requirements });

        let text = self
            .send(self.client.post(self.url("/hc/new_customer")).json(&body))
            .await?;
        let resp: NewCustomerResponse = serde_json::from_str(&text)?;
        resp.customer_ticket_id
            .ok_or(ApiError::MissingField("customer_ticket_id"))
    }

    async fn advance_ticket(&self, ticket: TicketId) -> Result<AdvanceOutcome, ApiError> {
        let req = self
            .client
            .put(self.url("/hc/nt"))
            .json(&self.ticket_body(ticket));
        let resp: TicketResponse = serde_json::from_str(&self.send(req).await?)?;
        Ok(AdvanceOutcome {
            current_ticket_id: resp.current_ticket_id.and_then(valid_ticket_id),
            skipped: resp.skipped_customer,
            items: parse_items(resp.current_user_detail.as_ref(), self.cfg.catalog_capacity),
        })
    }

    async fn current_ticket(&self) -> Result<Option<Ticket>, ApiError> {
        let req = self
            .client
            .get(self.url(&format!("/hc/ct/{}", self.cfg.device_id)));
        let resp: TicketResponse = serde_json::from_str(&self.send(req).await?)?;
        Ok(resp
            .current_ticket_id
            .and_then(valid_ticket_id)
            .map(|id| Ticket {
                id,
                items: parse_items(resp.current_user_detail.as_ref(), self.cfg.catalog_capacity),
            }))
    }

    async fn skip_ticket(&self, ticket: TicketId) -> Result<(), ApiError> {
        let req = self
            .client
            .put(self.url("/hc/ct/st"))
            .json(&self.ticket_body(ticket));
        self.send(req).await.map(|_| ())
    }
}

fn valid_ticket_id(raw: i64) -> Option<TicketId> {
    TicketId::try_from(raw).ok()
}

/// Parses a `{"<item>": <seconds>}` object, keeping at most `cap` entries.
pub(crate) fn parse_catalog(body: &str, cap: usize) -> Result<Vec<(ItemId, u32)>, ApiError> {
    let value: Value = serde_json::from_str(body)?;
    let obj = value
        .as_object()
        .ok_or_else(|| ApiError::Decode("catalog is not an object".to_string()))?;
    Ok(int_pairs(obj).take(cap).collect())
}

/// Parses an optional `{"<item>": <qty>}` object; anything else is empty.
pub(crate) fn parse_items(detail: Option<&Value>, cap: usize) -> Quantities {
    match detail.and_then(Value::as_object) {
        Some(obj) => int_pairs(obj).take(cap).collect(),
        None => Quantities::new(),
    }
}

fn int_pairs(obj: &Map<String, Value>) -> impl Iterator<Item = (ItemId, u32)> + '_ {
    obj.iter().filter_map(|(k, v)| {
        let item = k.trim().parse::<ItemId>().ok()?;
        let n = v.as_u64().and_then(|n| u32::try_from(n).ok())?;
        Some((item, n))
    })
}
