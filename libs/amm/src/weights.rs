//! Closed-form pool weights for a target long/short price
//!
//! For balances `(x_c, x_l, x_s)`, normalized price `v` and collateral per
//! pair `C` the weights satisfy three constraints:
//!
//! 1. `w_c + w_l + w_s = 1`
//! 2. long spot price in coin `(x_c / w_c) / (x_l / w_l) = v * C`
//! 3. short spot price in coin `(x_c / w_c) / (x_s / w_s) = (1 - v) * C`
//!
//! Constraints 2 and 3 give `w_l = v C x_l w_c / x_c` and
//! `w_s = (1 - v) C x_s w_c / x_c`; substituting into 1:
//!
//! ```text
//! D   = x_c + C * (v * x_l + (1 - v) * x_s)
//! w_c = x_c / D
//! w_l = v * C * x_l / D
//! w_s = (1 - v) * C * x_s / D
//! ```
//!
//! `D` is the pool value in coin at the target prices, so each weight is
//! that token's value share of the pool.

use crate::error::{ensure_finite, ensure_unit_interval, AmmError, Result};
use crate::token::{Balances, Weights};
use tracing::warn;

/// Tolerance on `w_c + w_l + w_s = 1`
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Weights used when either position balance is empty
pub const SINGLE_ASSET_WEIGHTS: Weights = Weights::new(1.0, 0.0, 0.0);

/// Derives weights from balances and a target price
pub struct WeightSolver;

impl WeightSolver {
    /// Solve for weights reproducing long price `v * C` and short price `(1 - v) * C`
    pub fn solve(balances: &Balances, price: f64, collateral_per_pair: f64) -> Result<Weights> {
        for (token, balance) in balances.iter() {
            ensure_finite(token.name(), balance)?;
            if balance < 0.0 {
                return Err(AmmError::domain(format!(
                    "{} balance must be non-negative, got {}",
                    token, balance
                )));
            }
        }
        ensure_unit_interval("price", price)?;
        ensure_finite("collateral_per_pair", collateral_per_pair)?;
        if collateral_per_pair <= 0.0 {
            return Err(AmmError::domain(format!(
                "collateral per pair must be positive, got {}",
                collateral_per_pair
            )));
        }

        let Balances {
            coin: x_c,
            long: x_l,
            short: x_s,
        } = *balances;

        if x_l == 0.0 || x_s == 0.0 {
            warn!(x_c, x_l, x_s, "position balance empty, pool weights collapse to coin");
            return Ok(SINGLE_ASSET_WEIGHTS);
        }
        if x_c == 0.0 {
            return Err(AmmError::degenerate(
                "coin balance is zero while position tokens are held",
            ));
        }

        let c = collateral_per_pair;
        let long_value = price * c * x_l;
        let short_value = (1.0 - price) * c * x_s;
        let denom = x_c + long_value + short_value;
        if !denom.is_finite() || denom <= 0.0 {
            return Err(AmmError::degenerate(format!(
                "weight denominator is {} for balances ({}, {}, {})",
                denom, x_c, x_l, x_s
            )));
        }

        let weights = Weights::new(x_c / denom, long_value / denom, short_value / denom);
        let sum = weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AmmError::degenerate(format!("weights sum to {}", sum)));
        }
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weighted_math::WeightedMath;

    #[test]
    fn test_reference_pool_weights() {
        let weights = WeightSolver::solve(&Balances::new(10000.0, 1000.0, 1000.0), 0.5, 1.0).unwrap();
        assert!((weights.coin - 10.0 / 11.0).abs() < 1e-12);
        assert!((weights.long - 1.0 / 22.0).abs() < 1e-12);
        assert!((weights.short - 1.0 / 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_reproduce_target_prices() {
        let balances = Balances::new(5000.0, 120.0, 45.0);
        let (v, c) = (0.3, 100.0);
        let w = WeightSolver::solve(&balances, v, c).unwrap();

        let long = WeightedMath::spot_price(balances.coin, w.coin, balances.long, w.long, 0.0).unwrap();
        let short = WeightedMath::spot_price(balances.coin, w.coin, balances.short, w.short, 0.0).unwrap();
        assert!((long - v * c).abs() / (v * c) < 1e-12);
        assert!((short - (1.0 - v) * c).abs() / ((1.0 - v) * c) < 1e-12);
        assert!((w.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_empty_short_collapses_to_coin() {
        let weights = WeightSolver::solve(&Balances::new(100.0, 50.0, 0.0), 0.5, 1.0).unwrap();
        assert_eq!(weights, SINGLE_ASSET_WEIGHTS);
    }

    #[test]
    fn test_zero_coin_is_degenerate() {
        let err = WeightSolver::solve(&Balances::new(0.0, 50.0, 50.0), 0.5, 1.0).unwrap_err();
        assert!(matches!(err, AmmError::DegenerateWeights { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_inputs() {
        let balances = Balances::new(100.0, 10.0, 10.0);
        assert!(matches!(
            WeightSolver::solve(&balances, 1.2, 1.0),
            Err(AmmError::Domain(_))
        ));
        assert!(matches!(
            WeightSolver::solve(&balances, 0.5, 0.0),
            Err(AmmError::Domain(_))
        ));
        assert!(matches!(
            WeightSolver::solve(&Balances::new(100.0, -1.0, 10.0), 0.5, 1.0),
            Err(AmmError::Domain(_))
        ));
    }
}
