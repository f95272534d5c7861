use std::time::Duration;

use thiserror::Error;

/// A call to an external collaborator failed. Transient: the next sweep or
/// the next user action simply tries again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Exchange rejected request (retCode {code}): {message}")]
    Exchange { code: i64, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("Reference price must be positive, got {0}")]
    NonPositivePrice(f64),
    #[error("Account balance must be positive, got {0}")]
    NonPositiveBalance(f64),
    #[error("Computed quantity must be positive, got {0}")]
    NonPositiveQuantity(f64),
    #[error("Cannot size a HOLD signal for {0}")]
    NotTradable(String),
}

/// The confirmation id is unknown, already consumed, or expired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No pending confirmation with id {0}")]
pub struct NotFoundError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Caller {0} is not the administrator")]
pub struct UnauthorizedError(pub i64);

/// Everything an admin command or a confirm/cancel action can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Unauthorized(#[from] UnauthorizedError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Runs `fut` under `limit`, folding an elapsed timer into `NetworkError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, NetworkError>
where
    F: std::future::Future<Output = Result<T, NetworkError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_call_becomes_timeout() {
        let limit = Duration::from_secs(10);
        let result: Result<(), NetworkError> = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(NetworkError::Timeout(limit)));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, NetworkError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
