use thiserror::Error;

/// Errors surfaced by the exchange gateway.
///
/// The taxonomy matters more than the individual variants: transient
/// errors may be retried on the next cycle, venue rejections must never
/// be retried blindly.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request rate limited by venue")]
    RateLimited,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("order below minimum notional")]
    BelowMinNotional,

    #[error("venue rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("malformed venue response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Transient errors are retried on the next scheduled pass; everything
    /// else is a venue decision that re-sending the same request cannot fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::RateLimited)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("price must be finite and non-negative")]
    InvalidPrice,

    #[error("quantity must be finite and non-negative")]
    InvalidQuantity,

    #[error("position requires positive quantity and entry cost")]
    EmptyPosition,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification send timed out")]
    Timeout,

    #[error("notification channel error: {0}")]
    Channel(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger connection error: {0}")]
    Connection(String),

    #[error("ledger query failed: {0}")]
    Query(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Network("timeout".into()).is_transient());
        assert!(GatewayError::RateLimited.is_transient());
        assert!(!GatewayError::InsufficientBalance.is_transient());
        assert!(!GatewayError::BelowMinNotional.is_transient());
        assert!(!GatewayError::Rejected {
            code: -1000,
            message: "unknown".into()
        }
        .is_transient());
    }

    #[test]
    fn error_display_includes_context() {
        let e = GatewayError::Rejected {
            code: -2010,
            message: "Account has insufficient balance".into(),
        };
        let s = e.to_string();
        assert!(s.contains("-2010"));
        assert!(s.contains("insufficient"));
    }
}
