use serde_json::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("an Unsplash access key is required")]
    MissingAccessKey,
    #[error("the Unsplash access key contains characters that cannot be sent in a header")]
    InvalidAccessKey,
    /// The API answered with a non-success status that is not a rate limit.
    #[error("Unsplash API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        payload: Option<Value>,
    },
    /// No response was obtained at all.
    #[error("Unsplash API error 0: connection error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Unsplash API returned malformed JSON for {path} (status {status}): {source}")]
    Decode {
        path: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// HTTP status of the failed request; `0` when no response was received.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Api { status, .. } | Error::Decode { status, .. } => *status,
            Error::MissingAccessKey | Error::InvalidAccessKey | Error::Transport(_) => 0,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Error::Api { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

/// Turns an error body into the human message and the structured payload.
///
/// JSON bodies carry either an `errors` array or an `error` string; anything
/// else falls back to the raw body or the canonical reason phrase.
pub(crate) fn error_details(body: &str, reason: &str) -> (String, Option<Value>) {
    let trimmed = body.trim();
    let mut message = if trimmed.is_empty() {
        reason.to_string()
    } else {
        trimmed.to_string()
    };

    let payload = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Some(Value::Object(map)),
        _ => None,
    };

    if let Some(payload) = &payload {
        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            message = errors.iter().map(value_text).collect::<Vec<_>>().join(", ");
        } else if let Some(error) = payload.get("error") {
            message = value_text(error);
        }
    }

    (message, payload)
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
