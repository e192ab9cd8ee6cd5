use thiserror::Error;

/// Longest slice of an error body kept for logs
const MAX_ERROR_BODY: usize = 1500;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{service} rejected the call: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Turn a non-2xx response into `ClientError::Api`, keeping the body short
pub async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ClientError::Api {
        status: status.as_u16(),
        message: truncate(&body, MAX_ERROR_BODY),
    })
}

/// Cut `text` to at most `max` characters
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_api_error_message() {
        let err = ClientError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 429): slow down");
    }
}
