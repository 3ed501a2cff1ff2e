use serde_json::Value;
use thiserror::Error;

/// Failure of a backend call, classified from the HTTP status the host saw.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("not signed in or not permitted: {detail}")]
    Unauthenticated { status: u16, detail: String },

    #[error("server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("network error: {detail}")]
    Transport { detail: String },

    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Classify a non-2xx response. Status 0 means the request never completed.
    pub fn from_status(status: u16, body: &Value) -> Self {
        let detail = detail_of(body).unwrap_or_else(|| default_detail(status).to_string());
        match status {
            0 => Self::Transport { detail },
            401 | 403 => Self::Unauthenticated { status, detail },
            500..=599 => Self::Server { status, detail },
            _ => Self::Rejected { status, detail },
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Unauthenticated { detail, .. }
            | Self::Server { detail, .. }
            | Self::Rejected { detail, .. }
            | Self::Transport { detail } => detail,
            Self::Malformed(detail) => detail,
        }
    }

    /// Input was refused; the user can correct it and retry.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Rejected { status: 400 | 422, .. })
    }
}

/// Best human-readable message in an error body.
fn detail_of(body: &Value) -> Option<String> {
    ["detail", "message", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .or_else(|| item.get("msg").and_then(Value::as_str).map(str::to_string))
                    })
                    .collect();
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            _ => None,
        })
}

fn default_detail(status: u16) -> &'static str {
    match status {
        0 => "request did not complete",
        401 => "session expired",
        403 => "not permitted",
        404 => "record not found",
        500..=599 => "backend unavailable",
        _ => "request failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_status_codes() {
        assert!(matches!(
            BackendError::from_status(401, &Value::Null),
            BackendError::Unauthenticated { .. }
        ));
        assert!(matches!(
            BackendError::from_status(503, &Value::Null),
            BackendError::Server { .. }
        ));
        assert!(matches!(
            BackendError::from_status(0, &Value::Null),
            BackendError::Transport { .. }
        ));
        assert!(BackendError::from_status(422, &Value::Null).is_validation());
    }

    #[test]
    fn prefers_detail_field_and_joins_lists() {
        let error = BackendError::from_status(400, &json!({"detail": "line misses parcel"}));
        assert_eq!(error.detail(), "line misses parcel");
        assert_eq!(error.to_string(), "line misses parcel");

        let error = BackendError::from_status(
            422,
            &json!({"detail": [{"msg": "name required"}, {"msg": "bad geometry"}]}),
        );
        assert_eq!(error.detail(), "name required; bad geometry");
    }
}
