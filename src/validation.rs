//! Request bodies accepted by the HTTP API and their validation rules.

use crate::error::RateLimitError;
use crate::timestamp::deserialize_instant;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    #[validate(length(min = 1, message = "clientId must not be empty"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "endpoint must not be empty"))]
    pub endpoint: String,
    #[serde(deserialize_with = "deserialize_instant")]
    pub timestamp: DateTime<Utc>,
}

/// Omitting `clientId` or `endpoint` makes the rule apply to every value.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[validate(range(min = 1, message = "limit must be greater than 0"))]
    pub limit: i64,
    #[validate(range(min = 1, message = "windowMinutes must be greater than 0"))]
    pub window_minutes: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResolveQuery {
    #[validate(length(min = 1, message = "clientId must not be empty"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "endpoint must not be empty"))]
    pub endpoint: String,
}

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Run the derived field rules, mapping failures to a 422
    pub fn validate<T: Validate>(request: &T) -> Result<(), RateLimitError> {
        request.validate().map_err(RateLimitError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_request_parses_camel_case() {
        let body = json!({
            "clientId": "c1",
            "endpoint": "/e",
            "timestamp": "2024-05-01T10:00:00Z"
        });

        let request: CheckRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.client_id, "c1");
        assert_eq!(request.endpoint, "/e");
        assert!(RequestValidator::validate(&request).is_ok());
    }

    #[test]
    fn test_empty_client_id_rejected() {
        let request: CheckRequest = serde_json::from_value(json!({
            "clientId": "",
            "endpoint": "/e",
            "timestamp": 0
        }))
        .unwrap();

        let err = RequestValidator::validate(&request).unwrap_err();
        assert!(matches!(err, RateLimitError::Validation(_)));
    }

    #[test]
    fn test_create_rule_optional_fields() {
        let request: CreateRuleRequest =
            serde_json::from_value(json!({ "limit": 10, "windowMinutes": 1 })).unwrap();
        assert!(request.client_id.is_none());
        assert!(request.endpoint.is_none());
        assert!(RequestValidator::validate(&request).is_ok());
    }

    #[test]
    fn test_create_rule_rejects_non_positive() {
        let zero_limit: CreateRuleRequest =
            serde_json::from_value(json!({ "limit": 0, "windowMinutes": 1 })).unwrap();
        assert!(RequestValidator::validate(&zero_limit).is_err());

        let negative_window: CreateRuleRequest =
            serde_json::from_value(json!({ "limit": 5, "windowMinutes": -1 })).unwrap();
        assert!(RequestValidator::validate(&negative_window).is_err());
    }
}
