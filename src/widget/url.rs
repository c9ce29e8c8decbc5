//! Widget navigation targets
//!
//! A widget's content configures itself from its own URL on load, so the id,
//! type and every parameter are encoded into the query string.

use indexmap::IndexMap;
use serde_json::Value;
use url::form_urlencoded;

/// Query keys owned by the registry; parameters cannot override them
const RESERVED_KEYS: [&str; 2] = ["id", "type"];

/// Build `entry?id=..&type=..&<params>`
pub fn build_widget_url(
    entry: &str,
    id: &str,
    widget_type: &str,
    params: &IndexMap<String, Value>,
) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("id", id);
    query.append_pair("type", widget_type);

    for (key, value) in params {
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::debug!("Skipping reserved widget parameter '{}'", key);
            continue;
        }
        query.append_pair(key, &param_to_query_value(value));
    }

    format!("{}?{}", entry, query.finish())
}

/// Strings are passed verbatim, everything else as compact JSON
fn param_to_query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode the query part of a widget URL back into pairs
pub fn parse_widget_query(url: &str) -> Vec<(String, String)> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_carries_id_type_and_params() {
        let mut params = IndexMap::new();
        params.insert("units".to_string(), json!("kph"));
        params.insert("maxRpm".to_string(), json!(8500));
        params.insert("showGear".to_string(), json!(true));

        let url = build_widget_url("widget.html", "spd1", "speedometer", &params);
        assert!(url.starts_with("widget.html?"));

        let pairs = parse_widget_query(&url);
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "spd1".to_string()),
                ("type".to_string(), "speedometer".to_string()),
                ("units".to_string(), "kph".to_string()),
                ("maxRpm".to_string(), "8500".to_string()),
                ("showGear".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let mut params = IndexMap::new();
        params.insert("label".to_string(), json!("Lap & Δ"));

        let url = build_widget_url("widget.html", "a b", "delta", &params);
        assert!(!url.contains(' '));

        let pairs = parse_widget_query(&url);
        assert_eq!(pairs[0].1, "a b");
        assert_eq!(pairs[2].1, "Lap & Δ");
    }

    #[test]
    fn test_reserved_keys_are_not_overridden() {
        let mut params = IndexMap::new();
        params.insert("id".to_string(), json!("spoofed"));

        let url = build_widget_url("widget.html", "spd1", "speedometer", &params);
        let ids: Vec<_> = parse_widget_query(&url)
            .into_iter()
            .filter(|(k, _)| k == "id")
            .collect();
        assert_eq!(ids, vec![("id".to_string(), "spd1".to_string())]);
    }

    #[test]
    fn test_nested_params_are_json() {
        let mut params = IndexMap::new();
        params.insert("colors".to_string(), json!({"redline": "#f00"}));

        let url = build_widget_url("widget.html", "tach", "tachometer", &params);
        let pairs = parse_widget_query(&url);
        assert_eq!(pairs[2].1, r##"{"redline":"#f00"}"##);
    }
}
