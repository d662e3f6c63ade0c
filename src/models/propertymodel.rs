use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// The listing fields copied into appointment responses.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PropertySummary {
    pub id: Uuid,
    pub title: String,
    pub property_type: String,
    pub price: f64,
    pub images: Json<Vec<String>>,
    pub street: Option<String>,
    pub city: String,
    pub district: Option<String>,
    pub country: Option<String>,
}

impl PropertySummary {
    pub fn address(&self) -> Address {
        Address {
            street: self.street.clone(),
            city: self.city.clone(),
            district: self.district.clone(),
            country: self.country.clone(),
        }
    }
}
