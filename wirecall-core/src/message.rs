//! JSON-RPC request and response envelopes
//!
//! This module marshals and unmarshals the wire envelopes for JSON-RPC
//! versions 1.0, 1.1, and 2.0. The three versions differ only in how they
//! tag themselves:
//!
//! - **1.0**: no version field at all
//! - **1.1**: `"version": "1.1"`
//! - **2.0**: `"jsonrpc": "2.0"`
//!
//! # Requests and Notifications
//!
//! A request carries a correlation id (`uid`) linking it to its eventual
//! response. A notification is a request with no id; no response is expected
//! or waited for. The two are the same envelope shape, distinguished solely
//! by the presence of the `id` key.
//!
//! # Parameters
//!
//! A call can carry either positional or named parameters, never both.
//! [`Params`] models this as a tagged variant so the mutual exclusion is
//! enforced by the type rather than inferred from an untyped container.
//!
//! # Responses
//!
//! A response carries exactly one of `result` or `error`. Unmarshalling a
//! response whose body is an error does not hand back a populated envelope:
//! it fails with [`Error::Rpc`] carrying the peer's code, message, and data.
//! Use [`ResponseMessage::parse`] when the error must stay inline (the
//! persistent-connection drain loop needs the id of an error reply to wake
//! its waiter).

use crate::error::{Error, Result, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// JSON-RPC protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// JSON-RPC 1.0: no version tag on the wire
    V1_0,
    /// JSON-RPC 1.1: tagged with a `version` field
    V1_1,
    /// JSON-RPC 2.0: tagged with a `jsonrpc` field
    #[default]
    V2_0,
}

impl Version {
    /// The wire representation of this version
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V1_0 => "1.0",
            Version::V1_1 => "1.1",
            Version::V2_0 => "2.0",
        }
    }

    /// Insert this version's tag into an envelope under construction
    fn apply_tag(&self, envelope: &mut Map<String, Value>) {
        match self {
            Version::V1_0 => {}
            Version::V1_1 => {
                envelope.insert("version".to_string(), Value::String("1.1".to_string()));
            }
            Version::V2_0 => {
                envelope.insert("jsonrpc".to_string(), Value::String("2.0".to_string()));
            }
        }
    }

    /// Resolve the version of a received envelope.
    ///
    /// The `jsonrpc` key wins if present, then the `version` key, then the
    /// default of 1.0 for untagged messages.
    fn from_envelope(envelope: &Map<String, Value>) -> Result<Self> {
        let tag = envelope.get("jsonrpc").or_else(|| envelope.get("version"));
        match tag {
            None => Ok(Version::V1_0),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(Error::Message(format!(
                "version tag must be a string, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1.0" => Ok(Version::V1_0),
            "1.1" => Ok(Version::V1_1),
            "2.0" => Ok(Version::V2_0),
            other => Err(Error::Message(format!(
                "unsupported JSON-RPC version: {}",
                other
            ))),
        }
    }
}

/// Call parameters: positional or named, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// An ordered sequence of positional values
    Positional(Vec<Value>),
    /// A mapping of named values
    Named(Map<String, Value>),
}

impl Params {
    /// Build positional parameters from a sequence of values
    pub fn positional(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }

    /// Build named parameters from key/value pairs
    pub fn named<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Params::Named(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Normalize a received `params` value.
    ///
    /// Arrays and objects are kept as-is; any other value is wrapped into a
    /// single-element positional sequence.
    fn from_wire(value: Value) -> Self {
        match value {
            Value::Array(values) => Params::Positional(values),
            Value::Object(map) => Params::Named(map),
            other => Params::Positional(vec![other]),
        }
    }
}

/// Reject explicitly empty correlation ids.
///
/// An empty id is an ambiguous "no id" signal: absent means notification,
/// so an id that is present but empty has no usable meaning.
fn check_uid(uid: &Value) -> Result<()> {
    let empty = match uid {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        Err(Error::Config("no (u)id provided".to_string()))
    } else {
        Ok(())
    }
}

/// A JSON-RPC request or notification envelope
///
/// # Invariant
///
/// `uid` is absent if and only if `notification` is true.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    /// Name of the remote method to invoke
    pub method: String,
    /// Correlation id; `None` for notifications
    pub uid: Option<Value>,
    /// Protocol version used for the wire tag
    pub version: Version,
    /// True if no response is expected
    pub notification: bool,
    /// Positional or named call arguments
    pub params: Option<Params>,
}

impl RequestMessage {
    /// Create a request with a freshly generated unique id
    pub fn new(method: impl Into<String>, version: Version) -> Self {
        Self {
            method: method.into(),
            uid: Some(Value::String(uuid::Uuid::new_v4().to_string())),
            version,
            notification: false,
            params: None,
        }
    }

    /// Create a request with an explicit correlation id.
    ///
    /// Fails with a configuration error if the id is empty (`null` or `""`).
    pub fn with_uid(
        method: impl Into<String>,
        uid: impl Into<Value>,
        version: Version,
    ) -> Result<Self> {
        let uid = uid.into();
        check_uid(&uid)?;
        Ok(Self {
            method: method.into(),
            uid: Some(uid),
            version,
            notification: false,
            params: None,
        })
    }

    /// Create a notification: a request with no id and no expected response
    pub fn notification(method: impl Into<String>, version: Version) -> Self {
        Self {
            method: method.into(),
            uid: None,
            version,
            notification: true,
            params: None,
        }
    }

    /// Replace the parameters wholesale
    pub fn set_params(&mut self, params: Params) {
        self.params = Some(params);
    }

    /// Builder-style variant of [`set_params`](Self::set_params)
    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Append a positional parameter.
    ///
    /// Fails with a configuration error if named parameters are already set:
    /// a call can carry one kind or the other, never both.
    pub fn push_param(&mut self, value: impl Into<Value>) -> Result<()> {
        match &mut self.params {
            None => {
                self.params = Some(Params::Positional(vec![value.into()]));
                Ok(())
            }
            Some(Params::Positional(values)) => {
                values.push(value.into());
                Ok(())
            }
            Some(Params::Named(_)) => Err(Error::Config(
                "cannot add a positional parameter to a request with named arguments".to_string(),
            )),
        }
    }

    /// Append a named parameter.
    ///
    /// Fails with a configuration error if positional parameters are already
    /// set.
    pub fn insert_param(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        match &mut self.params {
            None => {
                let mut map = Map::new();
                map.insert(name.into(), value.into());
                self.params = Some(Params::Named(map));
                Ok(())
            }
            Some(Params::Named(map)) => {
                map.insert(name.into(), value.into());
                Ok(())
            }
            Some(Params::Positional(_)) => Err(Error::Config(
                "cannot add a named parameter to a request with positional arguments".to_string(),
            )),
        }
    }

    /// Convert the request to wire text
    pub fn marshal(&self) -> Result<String> {
        if self.method.is_empty() {
            return Err(Error::Message("no method name specified".to_string()));
        }

        let mut envelope = Map::new();
        envelope.insert("method".to_string(), Value::String(self.method.clone()));

        if let Some(params) = &self.params {
            let value = serde_json::to_value(params)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            envelope.insert("params".to_string(), value);
        }

        if let Some(uid) = &self.uid {
            envelope.insert("id".to_string(), uid.clone());
        }

        self.version.apply_tag(&mut envelope);

        serde_json::to_string(&envelope).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a request envelope received over the wire.
    ///
    /// The absence of an `id` key marks the message as a notification.
    pub fn unmarshal(text: &str) -> Result<Self> {
        let envelope = parse_envelope(text)?;

        let version = Version::from_envelope(&envelope)?;
        let uid = envelope.get("id").cloned();
        let notification = uid.is_none();

        let method = match envelope.get("method").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return Err(Error::Message("no method specified".to_string())),
        };

        let params = envelope.get("params").cloned().map(Params::from_wire);

        Ok(Self {
            method,
            uid,
            version,
            notification,
            params,
        })
    }
}

/// A JSON-RPC response envelope
///
/// After a successful [`parse`](Self::parse), exactly one of `result` and
/// `error` is set. [`unmarshal`](Self::unmarshal) goes one step further and
/// turns an error-bodied response into [`Error::Rpc`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    /// Correlation id of the request being answered
    pub uid: Option<Value>,
    /// Protocol version used for the wire tag
    pub version: Version,
    /// The call result; mutually exclusive with `error`
    pub result: Option<Value>,
    /// The RPC-level error; mutually exclusive with `result`
    pub error: Option<RpcError>,
}

impl ResponseMessage {
    /// Create a successful response
    pub fn success(uid: impl Into<Value>, result: Value, version: Version) -> Self {
        Self {
            uid: Some(uid.into()),
            version,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn failure(uid: impl Into<Value>, error: RpcError, version: Version) -> Self {
        Self {
            uid: Some(uid.into()),
            version,
            result: None,
            error: Some(error),
        }
    }

    /// Convert the response to wire text.
    ///
    /// The `id`, `result`, and `error` keys are always emitted, with the
    /// unset side of result/error serialized as `null`.
    pub fn marshal(&self) -> Result<String> {
        let uid = self
            .uid
            .as_ref()
            .ok_or_else(|| Error::Message("unable to marshal response: no id specified".to_string()))?;

        let mut envelope = Map::new();
        envelope.insert("id".to_string(), uid.clone());
        envelope.insert(
            "result".to_string(),
            self.result.clone().unwrap_or(Value::Null),
        );
        envelope.insert(
            "error".to_string(),
            match &self.error {
                Some(error) => serde_json::to_value(error)
                    .map_err(|e| Error::Serialization(e.to_string()))?,
                None => Value::Null,
            },
        );

        self.version.apply_tag(&mut envelope);

        serde_json::to_string(&envelope).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a response envelope, keeping an error body inline.
    ///
    /// A `null` value for `result` or `error` counts as absent. Fails if
    /// both are present or neither is. This is the tagged form used by the
    /// drain loop, which needs the id of an error reply to wake its waiter.
    pub fn parse(text: &str) -> Result<Self> {
        let envelope = parse_envelope(text)?;

        let result = envelope.get("result").filter(|v| !v.is_null()).cloned();
        let error_value = envelope.get("error").filter(|v| !v.is_null()).cloned();

        if result.is_some() && error_value.is_some() {
            return Err(Error::Message(
                "invalid response data: both \"result\" and \"error\" specified".to_string(),
            ));
        }
        if result.is_none() && error_value.is_none() {
            return Err(Error::Message(
                "invalid response data: \"result\" or \"error\" not specified".to_string(),
            ));
        }

        let version = Version::from_envelope(&envelope)?;
        let uid = envelope.get("id").cloned();

        if let Some(error_value) = error_value {
            let error: RpcError = serde_json::from_value(error_value)
                .map_err(|e| Error::Message(format!("malformed error object: {}", e)))?;
            return Ok(Self {
                uid,
                version,
                result: None,
                error: Some(error),
            });
        }

        // Success replies must be correlatable
        if uid.is_none() {
            return Err(Error::Message("response has no id".to_string()));
        }

        Ok(Self {
            uid,
            version,
            result,
            error: None,
        })
    }

    /// Parse a response envelope, raising on an error body.
    ///
    /// When the peer signals an RPC error this fails with [`Error::Rpc`]
    /// carrying the error's code, message, and optional data; callers never
    /// receive a populated response in that case.
    pub fn unmarshal(text: &str) -> Result<Self> {
        let response = Self::parse(text)?;
        match response.error {
            Some(error) => Err(Error::Rpc(error)),
            None => Ok(response),
        }
    }
}

/// Shared first stage of unmarshalling: non-empty input, valid JSON, object.
fn parse_envelope(text: &str) -> Result<Map<String, Value>> {
    if text.is_empty() {
        return Err(Error::Message("empty JSON data received".to_string()));
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::Message(format!("invalid JSON: {}", e)))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Message(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marshal_named_params() {
        let mut request =
            RequestMessage::with_uid("Foo.Bar", json!(1), Version::V2_0).unwrap();
        request.insert_param("x", json!(1)).unwrap();
        request.insert_param("y", json!(2)).unwrap();

        let text = request.marshal().unwrap();
        let data: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(data["method"], "Foo.Bar");
        assert_eq!(data["params"], json!({"x": 1, "y": 2}));
        assert_eq!(data["id"], 1);
        assert_eq!(data["jsonrpc"], "2.0");
    }

    #[test]
    fn test_version_tags() {
        let request = RequestMessage::with_uid("m", json!(1), Version::V1_1).unwrap();
        let data: Value = serde_json::from_str(&request.marshal().unwrap()).unwrap();
        assert_eq!(data["version"], "1.1");
        assert!(data.get("jsonrpc").is_none());

        let request = RequestMessage::with_uid("m", json!(1), Version::V1_0).unwrap();
        let data: Value = serde_json::from_str(&request.marshal().unwrap()).unwrap();
        assert!(data.get("version").is_none());
        assert!(data.get("jsonrpc").is_none());
    }

    #[test]
    fn test_mixing_params_fails() {
        let mut request = RequestMessage::new("m", Version::V2_0);
        request.push_param(json!(1)).unwrap();
        let err = request.insert_param("x", json!(2)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let mut request = RequestMessage::new("m", Version::V2_0);
        request.insert_param("x", json!(2)).unwrap();
        let err = request.push_param(json!(1)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_uid_rejected() {
        assert!(matches!(
            RequestMessage::with_uid("m", json!(""), Version::V2_0),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RequestMessage::with_uid("m", Value::Null, Version::V2_0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_generated_uid_is_unique() {
        let a = RequestMessage::new("m", Version::V2_0);
        let b = RequestMessage::new("m", Version::V2_0);
        assert_ne!(a.uid, b.uid);
        assert!(!a.notification);
    }

    #[test]
    fn test_notification_has_no_id() {
        let request = RequestMessage::notification("Player.OnPlay", Version::V2_0);
        assert!(request.notification);
        assert!(request.uid.is_none());

        let data: Value = serde_json::from_str(&request.marshal().unwrap()).unwrap();
        assert!(data.get("id").is_none());
    }

    #[test]
    fn test_marshal_empty_method_fails() {
        let request = RequestMessage::new("", Version::V2_0);
        assert!(matches!(request.marshal(), Err(Error::Message(_))));
    }

    #[test]
    fn test_unmarshal_positional_params() {
        let request = RequestMessage::unmarshal(
            r#"{"jsonrpc": "2.0", "method": "VideoLibrary.GetMovies", "params": ["genre", "playcount", "file"], "id": 1}"#,
        )
        .unwrap();

        assert_eq!(request.method, "VideoLibrary.GetMovies");
        assert_eq!(request.version, Version::V2_0);
        match request.params.unwrap() {
            Params::Positional(values) => {
                assert_eq!(values.len(), 3);
                assert_eq!(values[2], "file");
            }
            _ => panic!("expected positional params"),
        }
    }

    #[test]
    fn test_unmarshal_named_params() {
        let request = RequestMessage::unmarshal(
            r#"{"jsonrpc": "2.0", "method": "VideoLibrary.GetMovies", "params": {"properties": ["genre"]}, "id": 1}"#,
        )
        .unwrap();

        assert_eq!(request.uid, Some(json!(1)));
        match request.params.unwrap() {
            Params::Named(map) => assert!(map.contains_key("properties")),
            _ => panic!("expected named params"),
        }
    }

    #[test]
    fn test_unmarshal_scalar_params_wrapped() {
        let request =
            RequestMessage::unmarshal(r#"{"jsonrpc": "2.0", "method": "m", "params": 7, "id": 1}"#)
                .unwrap();
        assert_eq!(request.params, Some(Params::Positional(vec![json!(7)])));
    }

    #[test]
    fn test_unmarshal_missing_method_fails() {
        let err = RequestMessage::unmarshal(r#"{"jsonrpc": "2.0", "id": 1}"#).unwrap_err();
        assert!(matches!(err, Error::Message(_)));
    }

    #[test]
    fn test_unmarshal_missing_id_is_notification() {
        let request =
            RequestMessage::unmarshal(r#"{"jsonrpc": "2.0", "method": "Player.OnPlay"}"#).unwrap();
        assert!(request.notification);
        assert!(request.uid.is_none());
    }

    #[test]
    fn test_unmarshal_version_resolution() {
        let request = RequestMessage::unmarshal(r#"{"method": "m", "id": 1}"#).unwrap();
        assert_eq!(request.version, Version::V1_0);

        let request =
            RequestMessage::unmarshal(r#"{"version": "1.1", "method": "m", "id": 1}"#).unwrap();
        assert_eq!(request.version, Version::V1_1);
    }

    #[test]
    fn test_unmarshal_empty_input_fails() {
        assert!(matches!(
            RequestMessage::unmarshal(""),
            Err(Error::Message(_))
        ));
        assert!(matches!(ResponseMessage::parse(""), Err(Error::Message(_))));
    }

    #[test]
    fn test_request_roundtrip() {
        let mut request =
            RequestMessage::with_uid("Player.Open", json!("abc"), Version::V2_0).unwrap();
        request.push_param(json!({"movieid": 3})).unwrap();

        let text = request.marshal().unwrap();
        let decoded = RequestMessage::unmarshal(&text).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_marshal_result() {
        let response = ResponseMessage::success(json!(1), json!("hello"), Version::V1_0);
        let data: Value = serde_json::from_str(&response.marshal().unwrap()).unwrap();

        assert_eq!(data["id"], 1);
        assert_eq!(data["result"], "hello");
        assert_eq!(data["error"], Value::Null);
    }

    #[test]
    fn test_response_marshal_error() {
        let response = ResponseMessage::failure(
            json!(1),
            RpcError::new(-32768, "Unable to get movies"),
            Version::V2_0,
        );
        let data: Value = serde_json::from_str(&response.marshal().unwrap()).unwrap();

        assert_eq!(data["id"], 1);
        assert_eq!(data["result"], Value::Null);
        assert_eq!(data["error"]["code"], -32768);
        assert_eq!(data["error"]["message"], "Unable to get movies");
        assert_eq!(data["jsonrpc"], "2.0");
    }

    #[test]
    fn test_response_marshal_without_id_fails() {
        let response = ResponseMessage {
            uid: None,
            version: Version::V2_0,
            result: Some(json!(1)),
            error: None,
        };
        assert!(matches!(response.marshal(), Err(Error::Message(_))));
    }

    #[test]
    fn test_response_unmarshal_success() {
        let response = ResponseMessage::unmarshal(
            r#"{"jsonrpc": "2.0", "result": {"a": 1}, "id": 1}"#,
        )
        .unwrap();

        assert_eq!(response.uid, Some(json!(1)));
        assert_eq!(response.version, Version::V2_0);
        assert_eq!(response.result, Some(json!({"a": 1})));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_response_unmarshal_both_fails() {
        let err = ResponseMessage::unmarshal(
            r#"{"jsonrpc": "2.0", "result": 1, "error": {"code": -32768, "message": "Bad id"}, "id": 1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Message(_)));
    }

    #[test]
    fn test_response_unmarshal_neither_fails() {
        let err =
            ResponseMessage::unmarshal(r#"{"jsonrpc": "2.0", "id": 1}"#).unwrap_err();
        assert!(matches!(err, Error::Message(_)));

        // null counts as absent
        let err = ResponseMessage::unmarshal(
            r#"{"jsonrpc": "2.0", "result": null, "error": null, "id": 1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Message(_)));
    }

    #[test]
    fn test_response_unmarshal_error_raises() {
        let err = ResponseMessage::unmarshal(
            r#"{"jsonrpc": "2.0", "result": null, "error": {"code": -32768, "message": "Bad id"}, "id": 1}"#,
        )
        .unwrap_err();

        match err {
            Error::Rpc(rpc) => {
                assert_eq!(rpc.code, -32768);
                assert_eq!(rpc.message, "Bad id");
                assert!(rpc.data.is_none());
            }
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_parse_keeps_error_inline() {
        let response = ResponseMessage::parse(
            r#"{"jsonrpc": "2.0", "error": {"code": -1, "message": "boom", "data": [1]}, "id": 9}"#,
        )
        .unwrap();

        assert_eq!(response.uid, Some(json!(9)));
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -1);
        assert_eq!(error.data, Some(json!([1])));
    }

    #[test]
    fn test_response_roundtrip() {
        let response = ResponseMessage::success(json!("req-1"), json!([1, "a"]), Version::V1_1);
        let text = response.marshal().unwrap();
        let decoded = ResponseMessage::unmarshal(&text).unwrap();
        assert_eq!(decoded, response);
    }
}
