use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Product record as the backend sends it. Everything beyond `id` is
/// optional and loosely typed: numeric fields may arrive as strings, the
/// photo list as an array, a JSON-encoded string or delimited text.
#[derive(Debug, Clone, Deserialize)]
pub struct WireProduct {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub available: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub weight: Value,
    #[serde(default)]
    pub calories: Value,
    #[serde(default)]
    pub proteins: Value,
    #[serde(default)]
    pub fats: Value,
    #[serde(default)]
    pub carbohydrates: Value,
    #[serde(default)]
    pub photos: Value,
}

/// Normalized catalog product. Numeric fields are always finite, photos is
/// always a list of trimmed, non-empty URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub available: bool,
    pub price: f64,
    pub weight: f64,
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub photos: Vec<String>,
}

/// Working copy of a product while it is being edited. Numeric fields hold
/// the raw form text; `photos_text` is the newline-joined free-text view of
/// the photo list.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub available: bool,
    pub price: String,
    pub weight: String,
    pub calories: String,
    pub proteins: String,
    pub fats: String,
    pub carbohydrates: String,
    pub photos: Vec<String>,
    pub photos_text: String,
}

/// Wire-ready product update: numeric fields coerced to numbers, photos a
/// JSON array, no text view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductPayload {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub available: bool,
    pub price: f64,
    pub weight: f64,
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_staff: Value,
}

impl User {
    /// The backend reports staff either as `true` or as `1`.
    pub fn is_admin(&self) -> bool {
        matches!(&self.is_staff, Value::Bool(true)) || self.is_staff.as_i64() == Some(1)
    }

    pub fn label(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    pub token: String,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_raw(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "new" => Some(OrderStatus::New),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireOrder {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub items: Value,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub address_id: Option<i64>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub total_price: Value,
    #[serde(default)]
    pub items_count: Value,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub comment: String,
    pub items: Vec<OrderItem>,
    pub user: Option<User>,
    pub user_id: Option<i64>,
    pub address_id: Option<i64>,
    pub address: Option<Address>,
    pub created_at: Option<DateTime<Utc>>,
    pub total_price: f64,
    pub items_count: i64,
}

impl Order {
    pub fn user_label(&self) -> String {
        match &self.user {
            Some(user) => match (&user.username, &user.email) {
                (Some(username), Some(email)) => format!("{username} ({email})"),
                (Some(username), None) => username.clone(),
                (None, Some(email)) => email.clone(),
                (None, None) => anonymous_user_label(self.user_id),
            },
            None => anonymous_user_label(self.user_id),
        }
    }

    /// Shortened id for list views; long opaque ids are elided in the middle.
    pub fn short_id(&self) -> String {
        if self.id.len() <= 12 {
            return self.id.clone();
        }
        format!("{}...{}", &self.id[..8], &self.id[self.id.len() - 4..])
    }
}

fn anonymous_user_label(user_id: Option<i64>) -> String {
    match user_id {
        Some(id) => format!("user #{id}"),
        None => "unknown user".to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub dessert_id: Option<i64>,
    #[serde(default)]
    pub dessert: Option<DessertRef>,
    #[serde(default)]
    pub qty: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub sum: Value,
}

impl OrderItem {
    pub fn label(&self) -> String {
        if let Some(name) = self.dessert.as_ref().and_then(|d| d.name.clone()) {
            return name;
        }
        match self.dessert_id {
            Some(id) => format!("dessert #{id}"),
            None => "dessert".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DessertRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub base_address: Option<String>,
    #[serde(default)]
    pub entrance: Value,
    #[serde(default)]
    pub floor: Value,
    #[serde(default)]
    pub flat: Value,
}

impl Address {
    /// One-line rendering used by the orders view: base address plus
    /// entrance/floor/flat when present.
    pub fn format(&self) -> String {
        let mut details = Vec::new();
        if let Some(base) = self.base_address.as_deref().filter(|s| !s.trim().is_empty()) {
            details.push(base.trim().to_string());
        }
        if let Some(entrance) = value_text(&self.entrance) {
            details.push(format!("entrance {entrance}"));
        }
        if let Some(floor) = value_text(&self.floor) {
            details.push(format!("floor {floor}"));
        }
        if let Some(flat) = value_text(&self.flat) {
            details.push(format!("apt {flat}"));
        }
        if details.is_empty() {
            "-".to_string()
        } else {
            details.join(", ")
        }
    }
}

/// Display form of a loosely typed scalar; `None` for null/empty values.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn staff_flag_accepts_bool_and_numeric_forms() {
        let as_bool: User = serde_json::from_value(json!({"is_staff": true})).unwrap();
        let as_int: User = serde_json::from_value(json!({"is_staff": 1})).unwrap();
        let as_zero: User = serde_json::from_value(json!({"is_staff": 0})).unwrap();
        let absent: User = serde_json::from_value(json!({})).unwrap();
        assert!(as_bool.is_admin());
        assert!(as_int.is_admin());
        assert!(!as_zero.is_admin());
        assert!(!absent.is_admin());
    }

    #[test]
    fn order_status_round_trips_known_values() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_raw(status.as_str()), Some(status));
        }
        assert_eq!(
            OrderStatus::from_raw(" Shipped "),
            Some(OrderStatus::Shipped)
        );
        assert_eq!(OrderStatus::from_raw("paid"), None);
    }

    #[test]
    fn address_format_skips_absent_details() {
        let address: Address = serde_json::from_value(json!({
            "base_address": "Lenina 5",
            "entrance": 2,
            "flat": "17"
        }))
        .unwrap();
        assert_eq!(address.format(), "Lenina 5, entrance 2, apt 17");

        let empty: Address = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.format(), "-");
    }
}
