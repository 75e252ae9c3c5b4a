//! Server-side policy for client definitions sent to the identity provider.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{IamError, IamResult};
use crate::types::requests::ClientPayload;
use crate::types::ClientRequest;

/// Fields forced on every outbound client payload, applied after the caller's
/// own fields.
pub const CLIENT_POLICY: &[(&str, PolicyValue)] = &[
    ("protocol", PolicyValue::Str("openid-connect")),
    ("clientAuthenticatorType", PolicyValue::Str("client-secret")),
    ("publicClient", PolicyValue::Bool(false)),
    ("serviceAccountsEnabled", PolicyValue::Bool(true)),
    ("standardFlowEnabled", PolicyValue::Bool(false)),
];

pub const OWNER_ATTRIBUTE: &str = "owner";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyValue {
    Str(&'static str),
    Bool(bool),
}

impl From<PolicyValue> for Value {
    fn from(value: PolicyValue) -> Self {
        match value {
            PolicyValue::Str(text) => Value::String(text.to_string()),
            PolicyValue::Bool(flag) => Value::Bool(flag),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientWrite {
    Create,
    Update,
}

/// Build the admin API payload for `request`. On creation the `owner`
/// attribute is replaced with a fresh identifier.
pub fn client_payload(request: &ClientRequest, write: ClientWrite) -> IamResult<ClientPayload> {
    if request.client_id.trim().is_empty() {
        return Err(IamError::BadRequest("clientId must not be empty".into()));
    }

    let mut payload = match serde_json::to_value(request)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for (field, value) in CLIENT_POLICY {
        payload.insert((*field).to_string(), Value::from(*value));
    }

    if write == ClientWrite::Create {
        let attributes = payload
            .entry("attributes")
            .or_insert_with(|| json!({}));
        if let Value::Object(attributes) = attributes {
            attributes.insert(
                OWNER_ATTRIBUTE.to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hostile_request() -> ClientRequest {
        let mut request = ClientRequest {
            client_id: "billing".into(),
            secret: Some("s3cret".into()),
            name: Some("Billing".into()),
            protocol: Some("saml".into()),
            client_authenticator_type: Some("client-jwt".into()),
            public_client: Some(true),
            service_accounts_enabled: Some(false),
            standard_flow_enabled: Some(true),
            enabled: true,
            ..ClientRequest::default()
        };
        request
            .attributes
            .insert(OWNER_ATTRIBUTE.into(), "mallory".into());
        request.attributes.insert("team".into(), "finance".into());
        request
    }

    #[test]
    fn policy_overrides_caller_fields() {
        let payload = client_payload(&hostile_request(), ClientWrite::Create).expect("payload");

        assert_eq!(payload["protocol"], "openid-connect");
        assert_eq!(payload["clientAuthenticatorType"], "client-secret");
        assert_eq!(payload["publicClient"], false);
        assert_eq!(payload["serviceAccountsEnabled"], true);
        assert_eq!(payload["standardFlowEnabled"], false);
        assert_eq!(payload["clientId"], "billing");
        assert_eq!(payload["secret"], "s3cret");
    }

    #[test]
    fn policy_is_idempotent() {
        let first = client_payload(&hostile_request(), ClientWrite::Update).expect("payload");
        let again: ClientRequest =
            serde_json::from_value(Value::Object(first.clone())).expect("request");
        let second = client_payload(&again, ClientWrite::Update).expect("payload");
        assert_eq!(first, second);
    }

    #[test]
    fn creation_seeds_owner_and_keeps_other_attributes() {
        let payload = client_payload(&hostile_request(), ClientWrite::Create).expect("payload");
        let owner = payload["attributes"][OWNER_ATTRIBUTE]
            .as_str()
            .expect("owner attribute");

        assert_ne!(owner, "mallory");
        assert!(Uuid::parse_str(owner).is_ok());
        assert_eq!(payload["attributes"]["team"], "finance");
    }

    #[test]
    fn update_keeps_caller_owner() {
        let payload = client_payload(&hostile_request(), ClientWrite::Update).expect("payload");
        assert_eq!(payload["attributes"][OWNER_ATTRIBUTE], "mallory");
    }

    #[test]
    fn empty_client_id_is_rejected() {
        let request = ClientRequest::default();
        assert!(matches!(
            client_payload(&request, ClientWrite::Create),
            Err(IamError::BadRequest(_))
        ));
    }
}
