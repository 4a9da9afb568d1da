//! # Response Builder
//!
//! Every reply has the same wire shape, whether it carries results or
//! reports a failure:
//!
//! ```json
//! { "pluginArg": { "name": "Exchange_rate", "instanceId": "abc123" }, "data": [ ... ] }
//! ```
//!
//! `instanceId` is omitted entirely when the request carried no token.

use serde::Serialize;

use super::record::Record;

/// Routing header of an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginArg {
    /// Name of the service that produced the reply.
    pub name: String,
    /// Correlation token copied from the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// A reply to one inbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundResponse {
    /// Source name and correlation token.
    pub plugin_arg: PluginArg,
    /// Matching records; empty on error or when nothing matched.
    pub data: Vec<Record>,
}

impl OutboundResponse {
    /// Reply carrying query results.
    pub fn success(source_name: &str, correlation_token: Option<String>, data: Vec<Record>) -> Self {
        Self {
            plugin_arg: PluginArg {
                name: source_name.to_string(),
                instance_id: correlation_token,
            },
            data,
        }
    }

    /// Reply sent when the request could not be served.
    pub fn empty(source_name: &str, correlation_token: Option<String>) -> Self {
        Self::success(source_name, correlation_token, Vec::new())
    }

    /// The echoed correlation token, if any.
    pub fn correlation_token(&self) -> Option<&str> {
        self.plugin_arg.instance_id.as_deref()
    }

    /// Serializes the reply to its JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn token_is_echoed_when_present() {
        let rec = json!({"tradeDateKey": "20250105", "rate": 7.8}).as_object().cloned().unwrap();
        let resp = OutboundResponse::success("Exchange_rate", Some("abc123".into()), vec![rec]);
        let wire: Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "pluginArg": {"name": "Exchange_rate", "instanceId": "abc123"},
                "data": [{"tradeDateKey": "20250105", "rate": 7.8}]
            })
        );
    }

    #[test]
    fn token_field_is_omitted_when_absent() {
        let wire = serde_json::to_value(OutboundResponse::empty("Exchange_rate", None)).unwrap();
        assert_eq!(wire, json!({"pluginArg": {"name": "Exchange_rate"}, "data": []}));
        assert!(wire["pluginArg"].get("instanceId").is_none());
    }
}
