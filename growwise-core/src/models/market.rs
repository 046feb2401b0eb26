use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Produce category. Stored and serialized in lowercase; parsed in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vegetable,
    Fruit,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Vegetable, Category::Fruit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vegetable => "vegetable",
            Category::Fruit => "fruit",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive exact match; plurals and other spellings are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vegetable" => Ok(Category::Vegetable),
            "fruit" => Ok(Category::Fruit),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A price entry before it is stored. `price` is the low end of the range, in rupees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub name: String,
    pub category: Category,
    pub price: f64,
    #[serde(default)]
    pub price_max: Option<f64>,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "kg".to_string()
}

impl MarketPrice {
    pub fn new(name: &str, category: Category, price: f64, price_max: Option<f64>, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            category,
            price,
            price_max,
            unit: unit.to_string(),
        }
    }

    /// Prices are finite and non-negative; the table enforces the same.
    pub fn has_valid_prices(&self) -> bool {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        valid(self.price) && self.price_max.map_or(true, valid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceRecord {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub price: f64,
    pub price_max: Option<f64>,
    pub unit: String,
    pub updated_at: DateTime<Utc>,
}
