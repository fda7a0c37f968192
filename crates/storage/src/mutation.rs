//! Field updates and preconditions applied to stored JSON data

use crate::store::StoredRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use dal_core::transform::{ARRAY_UNION, INCREMENT};
use dal_core::{DalError, DalResult, Key, Preconditions, Transform, Update, UpdateValue, Value};
use serde_json::{Map, Value as Json};

/// Check `preconditions` against the stored state of `key`
///
/// `existing` is `None` when the record is missing. A missing record fails
/// every non-empty precondition bag.
pub fn check_preconditions(
    key: &Key,
    existing: Option<&StoredRecord>,
    preconditions: &Preconditions,
) -> DalResult<()> {
    let record = match existing {
        Some(record) => record,
        None if preconditions.is_empty() => return Ok(()),
        None => {
            return Err(DalError::precondition_failed(format!(
                "record {} does not exist",
                key
            )))
        }
    };
    if let Some(expected) = preconditions.last_update_time() {
        if record.update_time != expected {
            return Err(DalError::precondition_failed(format!(
                "record {} was updated at {}, expected {}",
                key,
                record.update_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                expected.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            )));
        }
    }
    Ok(())
}

/// Apply `updates` in order to the JSON object `data`
///
/// Intermediate maps are created as needed. `now` is the value written for
/// `ServerTimestamp`.
pub fn apply_updates(data: &mut Json, updates: &[Update], now: DateTime<Utc>) -> DalResult<()> {
    if !data.is_object() {
        *data = Json::Object(Map::new());
    }
    for update in updates {
        update.validate()?;
        apply_update(data, update, now)
            .map_err(|e| e.context(format!("failed to apply update {}", update)))?;
    }
    Ok(())
}

fn apply_update(data: &mut Json, update: &Update, now: DateTime<Utc>) -> DalResult<()> {
    let path = update.path();
    let (leaf, parents) = match path.split_last() {
        Some(split) => split,
        None => return Err(DalError::validation("update has an empty field path")),
    };

    let mut current = data;
    for (depth, component) in parents.iter().enumerate() {
        let map = as_map(current, &path[..depth])?;
        current = map
            .entry(component.to_string())
            .or_insert_with(|| Json::Object(Map::new()));
    }
    let map = as_map(current, parents)?;

    match update.value() {
        UpdateValue::Value(v) => {
            map.insert(leaf.to_string(), v.to_json());
        }
        UpdateValue::DeleteField => {
            map.remove(*leaf);
        }
        UpdateValue::ServerTimestamp => {
            map.insert(
                leaf.to_string(),
                Json::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
        }
        UpdateValue::Transform(t) => {
            let next = apply_transform(map.get(*leaf), t)?;
            map.insert(leaf.to_string(), next);
        }
    }
    Ok(())
}

fn as_map<'a>(value: &'a mut Json, path: &[&str]) -> DalResult<&'a mut Map<String, Json>> {
    match value {
        Json::Object(map) => Ok(map),
        other => Err(DalError::invalid_argument(format!(
            "field {} is not a map but {}",
            path.join("."),
            json_type(other)
        ))),
    }
}

fn json_type(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "map",
    }
}

fn apply_transform(current: Option<&Json>, transform: &Transform) -> DalResult<Json> {
    match transform.name() {
        INCREMENT => increment(current, transform.value()),
        ARRAY_UNION => Ok(array_union(current, transform.value())),
        other => Err(DalError::not_supported(format!("transform {:?}", other))),
    }
}

fn increment(current: Option<&Json>, by: &Value) -> DalResult<Json> {
    let current = current.and_then(|c| c.as_number());
    let result = match (current, by) {
        (Some(n), Value::Int(by)) if n.is_i64() => {
            let n = n.as_i64().unwrap_or_default();
            n.checked_add(*by)
                .map(Json::from)
                .ok_or_else(|| DalError::invalid_argument("increment overflows i64"))?
        }
        (Some(n), by) => {
            let n = n.as_f64().unwrap_or_default();
            float(n + by.as_float().or_else(|| by.as_int().map(|i| i as f64)).unwrap_or_default())?
        }
        // Missing or non-numeric fields take the operand
        (None, by) => by.to_json(),
    };
    Ok(result)
}

fn float(x: f64) -> DalResult<Json> {
    serde_json::Number::from_f64(x)
        .map(Json::Number)
        .ok_or_else(|| DalError::invalid_argument(format!("increment result {} is not finite", x)))
}

fn array_union(current: Option<&Json>, elements: &Value) -> Json {
    let mut items = match current {
        Some(Json::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    if let Some(elements) = elements.as_array() {
        for element in elements {
            let element = element.to_json();
            if !items.contains(&element) {
                items.push(element);
            }
        }
    }
    Json::Array(items)
}
