//! City and pickup point records as the backend returns them.
//!
//! The JSON endpoints are loose about types: codes may arrive as numbers,
//! coordinates as numeric strings, flags as `null`. Decoding normalises all
//! of that here so the rest of the crate sees one shape.

use crate::core::geo::LatLng;
use serde::{Deserialize, Deserializer, Serialize};

/// A city candidate returned by the city search. Identity is `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(deserialize_with = "de_code")]
    pub code: String,
    #[serde(alias = "city", default, deserialize_with = "de_text")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "de_opt_coord")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_coord")]
    pub lon: Option<f64>,
}

impl City {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            region: None,
            country_code: None,
            country: None,
            lat: None,
            lon: None,
        }
    }

    pub fn with_coords(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn coordinates(&self) -> Option<LatLng> {
        LatLng::from_optional(self.lat, self.lon)
    }

    /// Text shown in the search box once the city is chosen: "Name, Region".
    pub fn display_label(&self) -> String {
        match self.region.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => format!("{}, {}", self.name, region),
            None => self.name.clone(),
        }
    }
}

/// A pickup point (PVZ). Identity is `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupPoint {
    #[serde(deserialize_with = "de_code")]
    pub code: String,
    #[serde(default, deserialize_with = "de_text")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub address: Option<String>,
    #[serde(default, alias = "addressFull", deserialize_with = "de_opt_text")]
    pub address_full: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub city: Option<String>,
    #[serde(default, alias = "workTime", deserialize_with = "de_opt_text")]
    pub work_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de_opt_coord")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_coord")]
    pub lon: Option<f64>,
    #[serde(default, rename = "type", deserialize_with = "de_opt_text")]
    pub point_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub owner_code: Option<String>,
    #[serde(
        default,
        rename = "is_cash_allowed",
        alias = "acceptsCash",
        deserialize_with = "de_flag"
    )]
    pub accepts_cash: bool,
    #[serde(
        default,
        rename = "is_card_allowed",
        alias = "acceptsCard",
        deserialize_with = "de_flag"
    )]
    pub accepts_card: bool,
}

impl PickupPoint {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            address: None,
            address_full: None,
            city: None,
            work_time: None,
            phone: None,
            lat: None,
            lon: None,
            point_type: None,
            owner_code: None,
            accepts_cash: false,
            accepts_card: false,
        }
    }

    pub fn with_coords(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Coordinates usable on the map; points without them stay list-only.
    pub fn coordinates(&self) -> Option<LatLng> {
        LatLng::from_optional(self.lat, self.lon)
    }

    /// Full address when it adds something over the short one.
    pub fn full_address(&self) -> &str {
        match (self.address.as_deref(), self.address_full.as_deref()) {
            (short, Some(full)) if !full.is_empty() && Some(full) != short => full,
            (Some(short), _) => short,
            (None, _) => "",
        }
    }

    /// "Cash, Card" style summary of accepted payments.
    pub fn payment_summary(&self) -> String {
        let mut payments = Vec::with_capacity(2);
        if self.accepts_cash {
            payments.push("Cash");
        }
        if self.accepts_card {
            payments.push("Card");
        }
        payments.join(", ")
    }
}

/// Codes are strings on our side even when the backend sends numbers.
fn de_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number code, got {other}"
        ))),
    }
}

fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(de_opt_text(deserializer)?.unwrap_or_default())
}

/// Accepts strings and numbers; `null`, `false`, and blanks become `None`.
fn de_opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numbers or numeric strings; anything unparsable is a missing coordinate.
fn de_opt_coord<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(
        serde_json::Value::deserialize(deserializer)?,
        serde_json::Value::Bool(true)
    ))
}
