use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{ApiClient, Decoded, RemoteSource};
use crate::error::{ErrorKind, Outcome};
use crate::models::{Dish, InfoPage, InfoParams, Menu, MenuParams};

/// Menu listings per outlet and language.
#[derive(Debug, Clone)]
pub struct MenuSource {
    client: ApiClient,
}

impl MenuSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl RemoteSource<MenuParams> for MenuSource {
    type Raw = Value;
    type Value = Menu;

    async fn fetch(&self, param: &MenuParams) -> Outcome<Value> {
        Ok(self.client.fetch_menu(param).await?)
    }

    fn decode(&self, raw: Value) -> Decoded<Menu> {
        decode_records(raw, "dishes", Dish::validate)
    }
}

/// Info pages per language.
#[derive(Debug, Clone)]
pub struct InfoSource {
    client: ApiClient,
}

impl InfoSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl RemoteSource<InfoParams> for InfoSource {
    type Raw = Value;
    type Value = Vec<InfoPage>;

    async fn fetch(&self, param: &InfoParams) -> Outcome<Value> {
        Ok(self.client.fetch_info(param).await?)
    }

    fn decode(&self, raw: Value) -> Decoded<Vec<InfoPage>> {
        decode_records(raw, "pages", InfoPage::validate)
    }
}

/// Decode a list of records one by one.
///
/// Accepts either a bare JSON array or an object holding the array under
/// `field`. Malformed or invalid records are reported in order and skipped.
/// If no record survives, no value is produced so existing data is kept.
pub fn decode_records<T, V>(raw: Value, field: &str, validate: V) -> Decoded<Vec<T>>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<(), ErrorKind>,
{
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => {
                return Decoded::rejected(ErrorKind::Payload(format!(
                    "response has no `{}` array",
                    field
                )))
            }
        },
        other => {
            return Decoded::rejected(ErrorKind::Payload(format!(
                "expected a JSON array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let mut records = Vec::with_capacity(total);
    let mut errors = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        let record = serde_json::from_value::<T>(item)
            .map_err(|e| ErrorKind::Payload(format!("record {}: {}", index, e)))
            .and_then(|record| validate(&record).map(|_| record));
        match record {
            Ok(record) => records.push(record),
            Err(e) => errors.push(e),
        }
    }

    debug!(total, decoded = records.len(), failed = errors.len(), "Decoded records");

    if records.is_empty() && !errors.is_empty() {
        return Decoded {
            value: None,
            errors,
        };
    }
    Decoded::partial(records, errors)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
