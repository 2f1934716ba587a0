use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premise_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    #[serde(default)]
    pub addresses: Vec<ServiceAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_past_due: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DashboardSnapshot {
    pub fn street(&self) -> Option<&str> {
        self.addresses.first()?.street.as_deref()
    }

    pub fn premise_id(&self) -> Option<&str> {
        self.addresses.first()?.premise_id.as_deref()
    }

    pub fn field(&self, key: &str) -> Option<Value> {
        lookup_field(&serde_json::to_value(self).ok()?, key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demand: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_demand: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_demand: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UsageRecord {
    pub fn field(&self, key: &str) -> Option<Value> {
        lookup_field(&serde_json::to_value(self).ok()?, key)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    #[serde(default)]
    pub account_number: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountSummary {
    /// The portal serves account numbers as strings or bare numbers.
    pub fn account_number_text(&self) -> Option<String> {
        match self.account_number.as_ref()? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UsageQueryResponse {
    #[serde(default)]
    pub data: Vec<UsageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub usage: Vec<UsageRecord>,
    pub dashboard: DashboardSnapshot,
}

fn lookup_field(serialized: &Value, key: &str) -> Option<Value> {
    let object = serialized.as_object()?;

    if let Some(found) = object.get(key) {
        return Some(found.clone());
    }

    let normalized_key = normalize_key(key);
    object.iter().find_map(|(candidate, value)| {
        if normalize_key(candidate) == normalized_key {
            Some(value.clone())
        } else {
            None
        }
    })
}

fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(|char| char.is_ascii_alphanumeric())
        .flat_map(|char| char.to_lowercase())
        .collect()
}
