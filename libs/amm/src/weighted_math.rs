//! Weighted-product (Balancer style) invariant mathematics
//!
//! Pure functions over balances and weights. Swaps priced here keep
//! `∏ balance_i ^ weight_i` constant when the swap fee is zero.
//!
//! The power terms are evaluated as `exp_m1(r * ln_1p(x))` so small trades
//! against deep balances keep full relative precision instead of losing it
//! to the `1 - x^r` cancellation.

use crate::error::{ensure_finite, AmmError, Result};
use crate::token::{Balances, Weights};

/// Weighted pool math with no internal state
pub struct WeightedMath;

impl WeightedMath {
    /// Weighted product `∏ balances[i] ^ weights[i]`
    ///
    /// Weights are expected to sum to one; that is the caller's
    /// responsibility. A zero weight on a zero balance contributes a factor
    /// of one.
    pub fn invariant(balances: &Balances, weights: &Weights) -> f64 {
        balances
            .iter()
            .map(|(token, balance)| balance.powf(weights[token]))
            .product()
    }

    /// Marginal price of one unit of the output token, paid in the input token
    ///
    /// `(balance_in / weight_in) / (balance_out / weight_out) / (1 - fee)`
    pub fn spot_price(
        balance_in: f64,
        weight_in: f64,
        balance_out: f64,
        weight_out: f64,
        fee: f64,
    ) -> Result<f64> {
        Self::validate_side("in", balance_in, weight_in)?;
        Self::validate_side("out", balance_out, weight_out)?;
        Self::validate_fee(fee)?;

        Ok((balance_in / weight_in) / (balance_out / weight_out) / (1.0 - fee))
    }

    /// Exact output amount for a given input
    ///
    /// # Arguments
    /// * `balance_out` / `weight_out` - Pool balance and weight of the token paid out
    /// * `balance_in` / `weight_in` - Pool balance and weight of the token paid in
    /// * `amount_in` - Gross input amount (fee is taken from it)
    /// * `fee` - Swap fee as a fraction of the input, in `[0, 1)`
    ///
    /// # Returns
    /// `balance_out * (1 - (balance_in / (balance_in + amount_in * (1 - fee))) ^ (weight_in / weight_out))`
    pub fn out_given_in(
        balance_out: f64,
        weight_out: f64,
        balance_in: f64,
        weight_in: f64,
        amount_in: f64,
        fee: f64,
    ) -> Result<f64> {
        Self::validate_side("in", balance_in, weight_in)?;
        Self::validate_side("out", balance_out, weight_out)?;
        Self::validate_fee(fee)?;
        ensure_finite("amount_in", amount_in)?;

        let net_in = amount_in * (1.0 - fee);
        if balance_in + net_in <= 0.0 {
            return Err(AmmError::domain(format!(
                "input balance after trade must stay positive: {} + {}",
                balance_in, net_in
            )));
        }

        // (bI / (bI + aI)) ^ r - 1 == exp_m1(-r * ln_1p(aI / bI))
        let exponent = weight_in / weight_out;
        let growth = (net_in / balance_in).ln_1p();
        Ok(-balance_out * (-exponent * growth).exp_m1())
    }

    /// Exact input amount required to receive `amount_out`
    ///
    /// `balance_in * ((balance_out / (balance_out - amount_out)) ^ (weight_out / weight_in) - 1) / (1 - fee)`
    pub fn in_given_out(
        balance_out: f64,
        weight_out: f64,
        balance_in: f64,
        weight_in: f64,
        amount_out: f64,
        fee: f64,
    ) -> Result<f64> {
        Self::validate_side("in", balance_in, weight_in)?;
        Self::validate_side("out", balance_out, weight_out)?;
        Self::validate_fee(fee)?;
        ensure_finite("amount_out", amount_out)?;

        if amount_out >= balance_out {
            return Err(AmmError::InsufficientLiquidity {
                amount_out,
                balance_out,
            });
        }

        let exponent = weight_out / weight_in;
        let shrink = (-amount_out / balance_out).ln_1p();
        Ok(balance_in * (-exponent * shrink).exp_m1() / (1.0 - fee))
    }

    fn validate_side(side: &str, balance: f64, weight: f64) -> Result<()> {
        ensure_finite("balance", balance)?;
        ensure_finite("weight", weight)?;
        if balance <= 0.0 {
            return Err(AmmError::domain(format!(
                "balance {} must be positive, got {}",
                side, balance
            )));
        }
        if weight <= 0.0 {
            return Err(AmmError::domain(format!(
                "weight {} must be positive, got {}",
                side, weight
            )));
        }
        Ok(())
    }

    fn validate_fee(fee: f64) -> Result<()> {
        ensure_finite("fee", fee)?;
        if !(0.0..1.0).contains(&fee) {
            return Err(AmmError::domain(format!("fee must lie in [0, 1), got {}", fee)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_diff(a: f64, b: f64) -> f64 {
        (a - b).abs() / a.abs().max(b.abs())
    }

    #[test]
    fn test_equal_weights_match_constant_product() {
        // 50/50 weights reduce to x*y=k: out = y * dx / (x + dx)
        let out = WeightedMath::out_given_in(2000.0, 0.5, 1000.0, 0.5, 100.0, 0.0).unwrap();
        let expected = 2000.0 * 100.0 / 1100.0;
        assert!(rel_diff(out, expected) < 1e-12);
    }

    #[test]
    fn test_spot_price_formula() {
        let price = WeightedMath::spot_price(10000.0, 0.8, 1000.0, 0.2, 0.0).unwrap();
        assert!(rel_diff(price, 2.5) < 1e-12);

        let with_fee = WeightedMath::spot_price(10000.0, 0.8, 1000.0, 0.2, 0.5).unwrap();
        assert!(rel_diff(with_fee, 5.0) < 1e-12);
    }

    #[test]
    fn test_round_trip_in_out() {
        let (b_out, w_out, b_in, w_in) = (1000.0, 0.05, 10000.0, 0.9);
        let amount_in = WeightedMath::in_given_out(b_out, w_out, b_in, w_in, 37.5, 0.003).unwrap();
        let amount_out =
            WeightedMath::out_given_in(b_out, w_out, b_in, w_in, amount_in, 0.003).unwrap();
        assert!(rel_diff(amount_out, 37.5) < 1e-9);
    }

    #[test]
    fn test_invariant_preserved_by_swap() {
        let balances = Balances::new(10000.0, 1000.0, 1000.0);
        let weights = Weights::new(0.9, 0.05, 0.05);
        let k0 = WeightedMath::invariant(&balances, &weights);

        let out = WeightedMath::out_given_in(1000.0, 0.05, 10000.0, 0.9, 250.0, 0.0).unwrap();
        let after = Balances::new(10250.0, 1000.0 - out, 1000.0);
        let k1 = WeightedMath::invariant(&after, &weights);
        assert!(rel_diff(k0, k1) < 1e-12);
    }

    #[test]
    fn test_degenerate_invariant_ignores_zero_weights() {
        let k = WeightedMath::invariant(&Balances::new(100.0, 50.0, 0.0), &Weights::new(1.0, 0.0, 0.0));
        assert_eq!(k, 100.0);
    }

    #[test]
    fn test_out_given_in_domain_errors() {
        assert!(matches!(
            WeightedMath::out_given_in(1000.0, 0.0, 1000.0, 0.5, 10.0, 0.0),
            Err(AmmError::Domain(_))
        ));
        assert!(matches!(
            WeightedMath::out_given_in(1000.0, 0.5, 1000.0, 0.5, -1000.0, 0.0),
            Err(AmmError::Domain(_))
        ));
        assert!(matches!(
            WeightedMath::out_given_in(1000.0, 0.5, 1000.0, 0.5, 10.0, 1.0),
            Err(AmmError::Domain(_))
        ));
    }

    #[test]
    fn test_in_given_out_liquidity_error() {
        let err = WeightedMath::in_given_out(1000.0, 0.5, 1000.0, 0.5, 1000.0, 0.0).unwrap_err();
        assert_eq!(
            err,
            AmmError::InsufficientLiquidity {
                amount_out: 1000.0,
                balance_out: 1000.0
            }
        );
    }
}
