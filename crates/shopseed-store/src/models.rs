use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub money_num: f64,
    pub favorite_product: String,
    pub prompt: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub rating: f64,
    pub quantity: i32,
    pub description: String,
    pub prompt: String,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AddressRow {
    pub id: i64,
    pub user_id: i64,
    pub label: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRow {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub star_rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub shipping_address_id: Option<i64>,
    pub billing_address_id: Option<i64>,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRow {
    pub id: i64,
    pub order_id: i64,
    pub amount: f64,
    pub status: String,
    pub intent_id: String,
    pub created_at: DateTime<Utc>,
}

/// Product fields needed to price an order line.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PricedProduct {
    pub id: i64,
    pub price: f64,
}

/// Product fields shown to the model when writing a review.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// A user together with the ids of their saved addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAddresses {
    pub user_id: i64,
    pub address_ids: Vec<i64>,
}

/// Order line to insert; the price is copied from the product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Shipped,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Shipped,
        OrderStatus::Refunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Payment state that a payment for an order in this state would have.
    pub fn payment_status(self) -> PaymentStatus {
        match self {
            OrderStatus::Pending => PaymentStatus::RequiresPaymentMethod,
            OrderStatus::Completed => PaymentStatus::Succeeded,
            OrderStatus::Cancelled => PaymentStatus::Failed,
            OrderStatus::Shipped => PaymentStatus::Processing,
            OrderStatus::Refunded => PaymentStatus::Canceled,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| format!("unknown order status '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    Succeeded,
    Failed,
    Processing,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "REQUIRES_PAYMENT_METHOD",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
