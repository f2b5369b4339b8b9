//! Pricing Engine Property Tests
//!
//! Mathematical properties that must hold for any valid pool, independent
//! of the particular balances, price or collateral.

use longshort_amm::{Balances, PoolState, RebalancePolicy, Token, WeightSolver, WeightedMath};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

fn rel_diff(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs()).max(f64::MIN_POSITIVE)
}

/// Pool inputs keeping every token's value share between roughly 1% and 70%
#[derive(Debug, Clone)]
struct PoolInputs {
    balances: Balances,
    price: f64,
    collateral: f64,
}

prop_compose! {
    fn pool_inputs()
        (
            coin in 1_000.0f64..1_000_000.0,
            long_ratio in 0.2f64..2.0,
            short_ratio in 0.2f64..2.0,
            price in 0.05f64..0.95,
            collateral in 0.5f64..500.0,
        ) -> PoolInputs {
        PoolInputs {
            balances: Balances::new(
                coin,
                coin * long_ratio / collateral,
                coin * short_ratio / collateral,
            ),
            price,
            collateral,
        }
    }
}

prop_compose! {
    fn weight_pair()(weight_in in 0.1f64..0.9, weight_out in 0.1f64..0.9) -> (f64, f64) {
        (weight_in, weight_out)
    }
}

fn position_token() -> impl Strategy<Value = Token> {
    prop_oneof![Just(Token::Long), Just(Token::Short)]
}

proptest! {
    /// Property: a swap without reweight leaves the weighted product unchanged
    #[test]
    fn swap_preserves_invariant(
        inputs in pool_inputs(),
        token in position_token(),
        buy in any::<bool>(),
        out_fraction in 0.001f64..0.3,
    ) {
        let mut pool = PoolState::new(inputs.balances, inputs.price, inputs.collateral).unwrap();
        let k0 = pool.invariant();

        let (token_in, token_out) = if buy { (Token::Coin, token) } else { (token, Token::Coin) };
        let amount_out = pool.balances()[token_out] * out_fraction;
        pool.swap_given_out(token_in, amount_out, token_out, false).unwrap();

        prop_assert!(rel_diff(pool.invariant(), k0) < TOLERANCE,
                    "Invariant moved from {} to {}", k0, pool.invariant());
    }

    /// Property: out_given_in(in_given_out(a)) recovers a
    #[test]
    fn in_out_round_trip(
        (weight_in, weight_out) in weight_pair(),
        balance_in in 1.0f64..1_000_000.0,
        balance_out in 1.0f64..1_000_000.0,
        out_fraction in 0.001f64..0.5,
        fee in 0.0f64..0.01,
    ) {
        let amount_out = balance_out * out_fraction;
        let amount_in = WeightedMath::in_given_out(
            balance_out, weight_out, balance_in, weight_in, amount_out, fee,
        ).unwrap();
        let recovered = WeightedMath::out_given_in(
            balance_out, weight_out, balance_in, weight_in, amount_in, fee,
        ).unwrap();

        prop_assert!(rel_diff(recovered, amount_out) < TOLERANCE,
                    "Expected {} out, recovered {}", amount_out, recovered);
    }

    /// Property: in_given_out(out_given_in(a)) recovers a
    #[test]
    fn out_in_round_trip(
        (weight_in, weight_out) in weight_pair(),
        balance_in in 1.0f64..1_000_000.0,
        balance_out in 1.0f64..1_000_000.0,
        in_fraction in 0.001f64..1.0,
    ) {
        let amount_in = balance_in * in_fraction;
        let amount_out = WeightedMath::out_given_in(
            balance_out, weight_out, balance_in, weight_in, amount_in, 0.0,
        ).unwrap();
        let recovered = WeightedMath::in_given_out(
            balance_out, weight_out, balance_in, weight_in, amount_out, 0.0,
        ).unwrap();

        prop_assert!(rel_diff(recovered, amount_in) < TOLERANCE,
                    "Expected {} in, recovered {}", amount_in, recovered);
    }

    /// Property: solved weights sum to one and reproduce v*C and (1-v)*C
    #[test]
    fn weights_normalized_and_price_reproducing(inputs in pool_inputs()) {
        let b = inputs.balances;
        let w = WeightSolver::solve(&b, inputs.price, inputs.collateral).unwrap();

        prop_assert!((w.sum() - 1.0).abs() < TOLERANCE, "Weights sum to {}", w.sum());

        let long = WeightedMath::spot_price(b.coin, w.coin, b.long, w.long, 0.0).unwrap();
        let short = WeightedMath::spot_price(b.coin, w.coin, b.short, w.short, 0.0).unwrap();
        prop_assert!(rel_diff(long, inputs.price * inputs.collateral) < TOLERANCE);
        prop_assert!(rel_diff(short, (1.0 - inputs.price) * inputs.collateral) < TOLERANCE);
    }

    /// Property: output grows with input, at a diminishing rate
    #[test]
    fn slippage_monotonic_and_concave(
        (weight_in, weight_out) in weight_pair(),
        balance_in in 1.0f64..1_000_000.0,
        balance_out in 1.0f64..1_000_000.0,
        in_fraction in 0.01f64..0.5,
        growth in 0.01f64..1.0,
    ) {
        let out = |amount: f64| {
            WeightedMath::out_given_in(balance_out, weight_out, balance_in, weight_in, amount, 0.0)
                .unwrap()
        };
        let small = balance_in * in_fraction;
        let large = small * (1.0 + growth);

        prop_assert!(out(small) < out(large),
                    "Output should increase: {} -> {}", out(small), out(large));
        prop_assert!(out(2.0 * small) < 2.0 * out(small),
                    "Second tranche should buy less than the first");
        prop_assert!(out(small) / small > out(large) / large,
                    "Average price should worsen with size");
    }

    /// Property: minting then redeeming the same coin amount restores balances
    #[test]
    fn mint_redeem_inverse(inputs in pool_inputs(), mint_fraction in 0.001f64..0.9) {
        let mut pool = PoolState::new(inputs.balances, inputs.price, inputs.collateral).unwrap();
        let before = *pool.balances();
        let coin_delta = before.coin * mint_fraction;

        let minted = pool.mint_redeem(coin_delta, None).unwrap();
        let redeemed = pool.mint_redeem(-minted * inputs.collateral, None).unwrap();
        let after = pool.balances();

        prop_assert!(rel_diff(minted, -redeemed) < TOLERANCE);
        prop_assert!(rel_diff(after.coin, before.coin) < TOLERANCE);
        prop_assert!(rel_diff(after.long, before.long) < TOLERANCE);
        prop_assert!(rel_diff(after.short, before.short) < TOLERANCE);
    }

    /// Property: liquidity added at the pool's own price leaves the LP price unchanged
    #[test]
    fn deposit_preserves_lp_price(
        inputs in pool_inputs(),
        deposit_fraction in 0.01f64..2.0,
        token_fraction in 0.0f64..1.0,
    ) {
        let mut pool = PoolState::new(inputs.balances, inputs.price, inputs.collateral).unwrap();
        let before = pool.lp_price().unwrap();
        let amount = pool.total_value() * deposit_fraction;

        pool.deposit_withdraw(amount, inputs.price, RebalancePolicy::Oracle, token_fraction).unwrap();
        prop_assert!(rel_diff(pool.lp_price().unwrap(), before) < TOLERANCE);
    }

    /// Property: total value equals coin plus positions valued at spot
    #[test]
    fn total_value_matches_pool_balance(inputs in pool_inputs()) {
        let pool = PoolState::new(inputs.balances, inputs.price, inputs.collateral).unwrap();
        prop_assert!(rel_diff(pool.total_value(), pool.pool_balance()) < TOLERANCE);
        prop_assert!(rel_diff(pool.implied_price().unwrap(), inputs.price) < TOLERANCE);
    }
}
