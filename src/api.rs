//! Client for the food-ordering backend.
//!
//! The backend speaks JSON with a couple of historical quirks this client
//! absorbs: admin routes moved under `/api/admin` (legacy deployments still
//! answer on the old paths), envelopes wrap collections one or two `data`
//! levels deep, and product updates are accepted as PUT on current builds
//! but PATCH on older Laravel-style ones.

use crate::config::ApiConfig;
use crate::draft::normalize_product;
use crate::http::build_client;
use crate::models::{
    Address, AuthSession, Order, OrderItem, OrderStatus, Product, ProductPayload, User, WireOrder,
    WireProduct,
};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("login response did not include a token")]
    MissingToken,
}

impl ApiError {
    /// Routes that moved under `/api/admin` answer 404 or 405 on legacy
    /// deployments; only those two statuses justify retrying the old path.
    fn is_legacy_route_miss(&self) -> bool {
        matches!(
            self,
            ApiError::Status {
                status: 404 | 405,
                ..
            }
        )
    }
}

/// Session-lifetime cache for address lookups. Grow-only: entries are
/// immutable once resolved and the process lives for one console session.
/// Negative lookups are cached too.
#[derive(Default)]
pub struct AddressCache {
    entries: Mutex<HashMap<i64, Option<Address>>>,
}

impl AddressCache {
    async fn get(&self, address_id: i64) -> Option<Option<Address>> {
        self.entries.lock().await.get(&address_id).cloned()
    }

    async fn insert(&self, address_id: i64, address: Option<Address>) {
        self.entries.lock().await.insert(address_id, address);
    }
}

pub struct ApiClient {
    base_url: String,
    http: Client,
    token: Option<String>,
    addresses: AddressCache,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            http: build_client(),
            token: None,
            addresses: AddressCache::default(),
        }
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;
        let payload: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&payload, status.as_u16()),
            });
        }

        Ok(payload)
    }

    /// Exchange credentials for a bearer token; the token is kept on the
    /// client for subsequent calls.
    pub async fn login(&mut self, login: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = json!({ "login": login, "password": password });
        let payload = self
            .request(Method::POST, "/api/auth/login", Some(&body))
            .await?;

        let token = pick_token(&payload).ok_or(ApiError::MissingToken)?;
        let user = pick_user(&payload);
        info!(target = "cafe.api", login, "logged in");

        self.token = Some(token.clone());
        Ok(AuthSession { token, user })
    }

    pub async fn fetch_products(&self) -> Result<Vec<Product>, ApiError> {
        let payload = self.request(Method::GET, "/api/products", None).await?;
        let items = payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let products: Vec<Product> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<WireProduct>(item).ok())
            .map(normalize_product)
            .collect();
        debug!(target = "cafe.api", count = products.len(), "products loaded");
        Ok(products)
    }

    pub async fn fetch_orders(&self) -> Result<Vec<Order>, ApiError> {
        let payload = match self.request(Method::GET, "/api/admin/orders", None).await {
            Ok(payload) => payload,
            Err(err) if err.is_legacy_route_miss() => {
                warn!(target = "cafe.api", "admin orders route missing, using legacy route");
                self.request(Method::GET, "/api/orders", None).await?
            }
            Err(err) => return Err(err),
        };
        let orders: Vec<Order> = pick_orders(&payload)
            .into_iter()
            .map(order_from_wire)
            .collect();
        debug!(target = "cafe.api", count = orders.len(), "orders loaded");
        Ok(orders)
    }

    /// Address lookup behind the session cache. A `None` result means the
    /// backend has no address under that id; that answer is cached as well.
    pub async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, ApiError> {
        if let Some(cached) = self.addresses.get(address_id).await {
            return Ok(cached);
        }

        let admin_path = format!("/api/admin/addresses/{address_id}");
        let payload = match self.request(Method::GET, &admin_path, None).await {
            Ok(payload) => payload,
            Err(err) if err.is_legacy_route_miss() => {
                let legacy_path = format!("/api/addresses/{address_id}");
                self.request(Method::GET, &legacy_path, None).await?
            }
            Err(err) => return Err(err),
        };

        let address = pick_address(&payload);
        self.addresses.insert(address_id, address.clone()).await;
        Ok(address)
    }

    pub async fn update_product(&self, payload: &ProductPayload) -> Result<(), ApiError> {
        let path = format!("/api/admin/products/{}", payload.id);
        let body = serde_json::to_value(payload).map_err(|err| ApiError::Request(err.to_string()))?;
        match self.request(Method::PUT, &path, Some(&body)).await {
            Ok(_) => Ok(()),
            // Older Laravel-style backends accept updates only as PATCH.
            Err(err) if err.is_legacy_route_miss() => {
                self.request(Method::PATCH, &path, Some(&body)).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<(), ApiError> {
        let path = format!("/api/admin/orders/{order_id}/status");
        let body = json!({ "status": status });
        self.request(Method::PATCH, &path, Some(&body)).await?;
        info!(target = "cafe.api", order_id, status = %status, "order status updated");
        Ok(())
    }
}

fn error_message(payload: &Value, status: u16) -> String {
    payload
        .get("message")
        .or_else(|| payload.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

fn pick_token(payload: &Value) -> Option<String> {
    payload
        .get("token")
        .or_else(|| payload.pointer("/data/token"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn pick_user(payload: &Value) -> Option<User> {
    let raw = payload
        .get("user")
        .or_else(|| payload.pointer("/data/user"))?;
    if raw.is_null() {
        return None;
    }
    serde_json::from_value(raw.clone()).ok()
}

/// Orders arrive as a bare array, under `data.data`, or under `data`.
fn pick_orders(payload: &Value) -> Vec<Value> {
    if let Some(items) = payload.as_array() {
        return items.clone();
    }
    if let Some(items) = payload.pointer("/data/data").and_then(Value::as_array) {
        return items.clone();
    }
    if let Some(items) = payload.get("data").and_then(Value::as_array) {
        return items.clone();
    }
    Vec::new()
}

/// A single entity is either under a non-array `data` or the payload itself.
fn pick_address(payload: &Value) -> Option<Address> {
    let raw = match payload.get("data") {
        Some(data) if !data.is_array() && !data.is_null() => data,
        _ => payload,
    };
    if !raw.is_object() {
        return None;
    }
    serde_json::from_value(raw.clone()).ok()
}

fn order_from_wire(raw: Value) -> Order {
    let wire: WireOrder = serde_json::from_value(raw).unwrap_or_default();

    let items: Vec<OrderItem> = wire
        .items
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let items_count = match wire.items_count.as_i64() {
        Some(count) => count,
        None => items.len() as i64,
    };

    Order {
        id: order_id_text(&wire.id),
        status: wire
            .status
            .as_deref()
            .and_then(OrderStatus::from_raw)
            .unwrap_or(OrderStatus::New),
        comment: wire.comment.unwrap_or_default(),
        items,
        user: wire.user,
        user_id: wire.user_id,
        address_id: wire.address_id,
        address: wire.address,
        created_at: wire.created_at.as_deref().and_then(parse_order_date),
        total_price: crate::draft::coerce_number(&wire.total_price),
        items_count,
    }
}

fn order_id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn parse_order_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_is_found_at_either_nesting_level() {
        assert_eq!(
            pick_token(&json!({"token": "abc"})).as_deref(),
            Some("abc")
        );
        assert_eq!(
            pick_token(&json!({"data": {"token": "xyz"}})).as_deref(),
            Some("xyz")
        );
        assert_eq!(pick_token(&json!({"data": {}})), None);
    }

    #[test]
    fn orders_envelope_variants_unwrap_to_the_same_list() {
        let orders = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(pick_orders(&orders).len(), 2);
        assert_eq!(
            pick_orders(&json!({"data": {"data": orders.clone()}})).len(),
            2
        );
        assert_eq!(pick_orders(&json!({"data": orders})).len(), 2);
        assert!(pick_orders(&json!({"data": null})).is_empty());
        assert!(pick_orders(&json!("nonsense")).is_empty());
    }

    #[test]
    fn address_envelope_prefers_non_array_data() {
        let address = pick_address(&json!({"data": {"base_address": "Mira 1"}})).unwrap();
        assert_eq!(address.base_address.as_deref(), Some("Mira 1"));

        let bare = pick_address(&json!({"base_address": "Mira 2"})).unwrap();
        assert_eq!(bare.base_address.as_deref(), Some("Mira 2"));

        assert!(pick_address(&json!(null)).is_none());
        assert!(pick_address(&json!({"data": null})).is_none());
    }

    #[test]
    fn wire_orders_normalize_status_items_and_dates() {
        let order = order_from_wire(json!({
            "id": 42,
            "status": "weird-state",
            "items": [
                {"id": 1, "dessert": {"name": "Eclair"}, "qty": 2, "price": "120", "sum": 240},
                "not an item"
            ],
            "created_at": "2026-05-01T10:30:00+03:00",
            "total_price": "240"
        }));

        assert_eq!(order.id, "42");
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].label(), "Eclair");
        assert_eq!(order.items_count, 1);
        assert_eq!(order.total_price, 240.0);
        assert!(order.created_at.is_some());
    }

    #[test]
    fn order_with_no_usable_fields_still_normalizes() {
        let order = order_from_wire(json!("garbage"));
        assert_eq!(order.id, "");
        assert_eq!(order.status, OrderStatus::New);
        assert!(order.items.is_empty());
    }

    #[test]
    fn error_message_prefers_backend_text() {
        assert_eq!(error_message(&json!({"message": "bad"}), 422), "bad");
        assert_eq!(error_message(&json!({"error": "nope"}), 403), "nope");
        assert_eq!(error_message(&Value::Null, 500), "HTTP 500");
    }
}
