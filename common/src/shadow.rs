//! Shadow document shapes exchanged with the remote side.
//!
//! Inbound: delta notifications `{"state": {...}}` and get responses whose
//! `state` may carry a `delta` map. Outbound: update requests with exactly one
//! of `state.reported` / `state.desired` populated.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::PayloadError, types::ChangeSet};

/// Requested values from the remote side, in the order they were received.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeltaRequest {
    entries: Map<String, Value>,
}

impl DeltaRequest {
    pub fn new(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    /// Parses a delta notification body `{"state": {<property>: <value>}}`.
    pub fn from_notification(payload: &[u8]) -> Result<Self, PayloadError> {
        let document: Value = serde_json::from_slice(payload)?;
        let state = document.get("state").ok_or(PayloadError::MissingState)?;
        match state {
            Value::Object(entries) => Ok(Self::new(entries.clone())),
            _ => Err(PayloadError::NotAnObject("state")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSection {
    Reported,
    Desired,
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateDocument {
    pub state: UpdateState,
    #[serde(rename = "clientToken", skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<Map<String, Value>>,
}

impl UpdateDocument {
    pub fn new(section: UpdateSection, changes: &ChangeSet) -> Self {
        let map = Some(changes.to_json_map());
        let state = match section {
            UpdateSection::Reported => UpdateState {
                reported: map,
                desired: None,
            },
            UpdateSection::Desired => UpdateState {
                reported: None,
                desired: map,
            },
        };
        Self {
            state,
            client_token: None,
        }
    }

    pub fn reported(changes: &ChangeSet) -> Self {
        Self::new(UpdateSection::Reported, changes)
    }

    pub fn desired(changes: &ChangeSet) -> Self {
        Self::new(UpdateSection::Desired, changes)
    }

    pub fn with_client_token(mut self, token: impl Into<String>) -> Self {
        self.client_token = Some(token.into());
        self
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Serialize)]
pub struct GetRequest {
    #[serde(rename = "clientToken")]
    pub client_token: String,
}

/// The pieces of a full shadow document the agent acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowSnapshot {
    pub version: Option<u64>,
    pub delta: Option<DeltaRequest>,
    pub document: Value,
}

impl ShadowSnapshot {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let document: Value = serde_json::from_slice(payload)?;
        let state = document.get("state").ok_or(PayloadError::MissingState)?;
        let delta = match state.get("delta") {
            None | Some(Value::Null) => None,
            Some(Value::Object(entries)) => Some(DeltaRequest::new(entries.clone())),
            Some(_) => return Err(PayloadError::NotAnObject("state.delta")),
        };
        let version = document.get("version").and_then(Value::as_u64);
        Ok(Self {
            version,
            delta,
            document,
        })
    }
}

/// Error body published on the `*/rejected` topics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rejection {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "clientToken", default)]
    pub client_token: Option<String>,
}

impl Rejection {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Reads `clientToken` out of any response body.
pub fn client_token_of(payload: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(rename = "clientToken")]
        client_token: Option<String>,
    }

    serde_json::from_slice::<Envelope>(payload)
        .ok()
        .and_then(|envelope| envelope.client_token)
}

/// Issues request tokens unique to one client session.
#[derive(Debug)]
pub struct TokenGenerator {
    prefix: String,
    next: u64,
}

impl TokenGenerator {
    pub fn new(client_id: &str) -> Self {
        Self {
            prefix: format!("{client_id}-{}", Utc::now().timestamp_millis()),
            next: 0,
        }
    }

    pub fn next_token(&mut self) -> String {
        self.next = self.next.wrapping_add(1);
        format!("{}-{}", self.prefix, self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Property;
    use pretty_assertions::assert_eq;

    #[test]
    fn delta_keeps_remote_key_order() {
        let delta =
            DeltaRequest::from_notification(br#"{"state":{"outlet2":"on","outlet1":"off"},"version":7}"#)
                .unwrap();
        let keys: Vec<&str> = delta.iter().map(|(key, _)| key).collect();

        assert_eq!(keys, vec!["outlet2", "outlet1"]);
    }

    #[test]
    fn delta_without_state_is_malformed() {
        assert!(matches!(
            DeltaRequest::from_notification(br#"{"version":1}"#),
            Err(PayloadError::MissingState)
        ));
        assert!(matches!(
            DeltaRequest::from_notification(br#"{"state":"on"}"#),
            Err(PayloadError::NotAnObject("state"))
        ));
        assert!(matches!(
            DeltaRequest::from_notification(b"{not json"),
            Err(PayloadError::Json(_))
        ));
    }

    #[test]
    fn reported_update_omits_desired() {
        let changes: ChangeSet = [(Property::Outlet1, "on")].into_iter().collect();
        let body = UpdateDocument::reported(&changes)
            .with_client_token("iota-1")
            .to_vec()
            .unwrap();

        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"state":{"reported":{"outlet1":"on"}},"clientToken":"iota-1"}"#
        );
    }

    #[test]
    fn desired_update_omits_reported() {
        let changes: ChangeSet = [(Property::Outlet2, "off")].into_iter().collect();
        let body = serde_json::to_string(&UpdateDocument::desired(&changes)).unwrap();

        assert_eq!(body, r#"{"state":{"desired":{"outlet2":"off"}}}"#);
    }

    #[test]
    fn snapshot_extracts_delta() {
        let raw = br#"{
            "state": {
                "desired": {"outlet1": "on"},
                "reported": {"outlet1": "off"},
                "delta": {"outlet1": "on"}
            },
            "version": 12,
            "clientToken": "iota-3"
        }"#;
        let snapshot = ShadowSnapshot::parse(raw).unwrap();

        assert_eq!(snapshot.version, Some(12));
        let delta = snapshot.delta.unwrap();
        assert_eq!(delta.len(), 1);
        assert_eq!(client_token_of(raw).as_deref(), Some("iota-3"));
    }

    #[test]
    fn snapshot_without_delta() {
        let snapshot = ShadowSnapshot::parse(br#"{"state":{"reported":{"outlet1":"off"}}}"#).unwrap();
        assert_eq!(snapshot.delta, None);
        assert_eq!(snapshot.version, None);
    }

    #[test]
    fn rejection_body_parses() {
        let rejection =
            Rejection::parse(br#"{"code":400,"message":"Missing required node: state","clientToken":"t"}"#)
                .unwrap();
        assert_eq!(rejection.code, 400);
        assert_eq!(rejection.client_token.as_deref(), Some("t"));
    }

    #[test]
    fn tokens_are_unique() {
        let mut tokens = TokenGenerator::new("iota");
        let first = tokens.next_token();
        let second = tokens.next_token();

        assert_ne!(first, second);
        assert!(first.starts_with("iota-"));
    }
}
