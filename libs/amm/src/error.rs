//! Error types for the long/short AMM engine
//!
//! Every failure is local to a single operation. A failed pool operation
//! leaves the pool exactly as it was before the call.

use crate::token::Token;
use thiserror::Error;

/// Errors raised by the pricing, weighting and accounting engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmmError {
    /// Malformed numeric input (non-positive weight or balance, amount outside
    /// the domain of the power function, non-finite value)
    #[error("Domain error: {0}")]
    Domain(String),

    /// Swap output would drain the pool's balance of the output token
    #[error("Insufficient balance: swap needs {requested} {token} but pool holds {available}")]
    InsufficientBalance {
        token: Token,
        requested: f64,
        available: f64,
    },

    /// Requested output is at or beyond the balance it is drawn from
    #[error("Insufficient liquidity: amount out {amount_out} must be below balance {balance_out}")]
    InsufficientLiquidity { amount_out: f64, balance_out: f64 },

    /// Mint or withdrawal needs more coin than the pool holds
    #[error("Insufficient coin: requested {requested} but pool holds {available}")]
    InsufficientCoin { requested: f64, available: f64 },

    /// Redeem needs more long/short pairs than the pool holds
    #[error("Insufficient position tokens: requested {requested_pairs} pairs but pool holds {available_pairs}")]
    InsufficientPositionTokens {
        requested_pairs: f64,
        available_pairs: f64,
    },

    /// Weights cannot be derived for the current balances and price
    #[error("Degenerate weights: {reason}")]
    DegenerateWeights { reason: String },

    /// Action kind not understood by the sequencer
    #[error("Unknown action: '{0}'")]
    UnknownAction(String),

    /// Token name not understood
    #[error("Unknown token: '{0}'")]
    UnknownToken(String),

    /// Policy branch that has no defined behavior yet
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, AmmError>;

impl AmmError {
    pub(crate) fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateWeights {
            reason: reason.into(),
        }
    }
}

/// Reject NaN and infinities before they reach the power functions
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AmmError::domain(format!("{name} must be finite, got {value}")))
    }
}

/// Normalized prices live on the floor-to-cap range `[0, 1]`
pub(crate) fn ensure_unit_interval(name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AmmError::domain(format!("{name} must lie in [0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_quantities() {
        let err = AmmError::InsufficientBalance {
            token: Token::Short,
            requested: 1200.0,
            available: 1000.0,
        };
        let display = format!("{}", err);
        assert!(display.contains("short"));
        assert!(display.contains("1200"));
        assert!(display.contains("1000"));
    }

    #[test]
    fn test_unit_interval_guard() {
        assert!(ensure_unit_interval("price", 0.0).is_ok());
        assert!(ensure_unit_interval("price", 1.0).is_ok());
        assert!(matches!(
            ensure_unit_interval("price", 1.5),
            Err(AmmError::Domain(_))
        ));
        assert!(matches!(
            ensure_unit_interval("price", f64::NAN),
            Err(AmmError::Domain(_))
        ));
    }
}
