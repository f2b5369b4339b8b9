//! Per-transaction swap record

use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable record of one executed swap, kept for reporting and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap {
    pub token_in: Token,
    pub amount_in: f64,
    pub token_out: Token,
    pub amount_out: f64,
    /// Position token the spot prices below refer to
    pub priced_token: Token,
    /// Coin spot price of `priced_token` before the trade
    pub initial_spot: f64,
    /// Coin paid per position token, or coin received per position token sold.
    /// Output per input for long <-> short swaps.
    pub trade_price: f64,
    /// Spot price right after the balances moved, before any reweight
    pub post_trade_spot: f64,
    /// Spot price once the optional reweight has been applied
    pub final_spot: f64,
    /// Price of `priced_token` in the absence of any imbalance (`v*C` or `(1-v)*C`)
    pub fair_price: f64,
}

impl Swap {
    /// Spot premium over fair value before the trade
    pub fn initial_premium(&self) -> f64 {
        self.initial_spot - self.fair_price
    }
}

impl fmt::Display for Swap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade {:.2} {} for {:.2} {} at initial spot {:.2} (-fair price = {:.2}), \
             trade price {:.2}, post-trade spot {:.2}, final spot {:.2}",
            self.amount_in,
            self.token_in,
            self.amount_out,
            self.token_out,
            self.initial_spot,
            self.initial_premium(),
            self.trade_price,
            self.post_trade_spot,
            self.final_spot
        )
    }
}
