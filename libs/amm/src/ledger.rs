//! Cumulative token flows and solvency metrics
//!
//! Flows are signed from the pool's point of view: tokens entering the
//! pool are positive, tokens leaving it negative. Sums are kept in
//! `Decimal` so long simulations do not drift in the liabilities figure.

use crate::error::{AmmError, Result};
use crate::token::{Token, TokenVector};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Running per-token flows owned by a pool
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountingLedger {
    coin: Decimal,
    long: Decimal,
    short: Decimal,
    /// Net coin added by liquidity deposits less withdrawals
    net_deposits: Decimal,
}

impl AccountingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger restored from previously recorded flows
    pub fn with_flows(coin: Decimal, long: Decimal, short: Decimal) -> Self {
        Self {
            coin,
            long,
            short,
            net_deposits: Decimal::ZERO,
        }
    }

    pub fn cumulative(&self, token: Token) -> Decimal {
        match token {
            Token::Coin => self.coin,
            Token::Long => self.long,
            Token::Short => self.short,
        }
    }

    /// Cumulative flows as floating-point values
    pub fn cumulative_f64(&self) -> TokenVector {
        TokenVector::new(
            self.coin.to_f64().unwrap_or(f64::NAN),
            self.long.to_f64().unwrap_or(f64::NAN),
            self.short.to_f64().unwrap_or(f64::NAN),
        )
    }

    pub fn net_deposits(&self) -> Decimal {
        self.net_deposits
    }

    /// Cumulative coin paid into the pool
    pub fn assets(&self) -> Decimal {
        self.coin
    }

    /// Worst-case collateral claim of position tokens sold out of the pool
    ///
    /// Any single position token can end up worth the full collateral of
    /// its pair (floor-to-cap swing), so each outstanding token counts `C`.
    pub fn liabilities(&self, collateral_per_pair: Decimal) -> Result<Decimal> {
        self.long
            .checked_add(self.short)
            .and_then(|tokens| tokens.checked_mul(collateral_per_pair))
            .map(|claim| -claim)
            .ok_or_else(|| overflow("liabilities"))
    }

    pub fn equity(&self, collateral_per_pair: Decimal) -> Result<Decimal> {
        self.assets()
            .checked_sub(self.liabilities(collateral_per_pair)?)
            .ok_or_else(|| overflow("equity"))
    }

    pub(crate) fn record_swap(
        &mut self,
        token_in: Token,
        amount_in: f64,
        token_out: Token,
        amount_out: f64,
    ) -> Result<()> {
        let amount_in = to_decimal(amount_in)?;
        let amount_out = to_decimal(amount_out)?;
        let mut next = self.clone();
        let credited = checked_add(next.cumulative(token_in), amount_in)?;
        *next.slot(token_in) = credited;
        let debited = checked_add(next.cumulative(token_out), -amount_out)?;
        *next.slot(token_out) = debited;
        *self = next;
        Ok(())
    }

    /// Pool coin converted into (or recovered from) long/short pairs
    pub(crate) fn record_mint_redeem(&mut self, coin_delta: f64, pairs: f64) -> Result<()> {
        let coin_delta = to_decimal(coin_delta)?;
        let pairs = to_decimal(pairs)?;
        let coin = checked_add(self.coin, -coin_delta)?;
        let long = checked_add(self.long, pairs)?;
        let short = checked_add(self.short, pairs)?;
        self.coin = coin;
        self.long = long;
        self.short = short;
        Ok(())
    }

    pub(crate) fn record_liquidity(&mut self, coin_amount: f64) -> Result<()> {
        self.net_deposits = checked_add(self.net_deposits, to_decimal(coin_amount)?)?;
        Ok(())
    }

    fn slot(&mut self, token: Token) -> &mut Decimal {
        match token {
            Token::Coin => &mut self.coin,
            Token::Long => &mut self.long,
            Token::Short => &mut self.short,
        }
    }
}

fn checked_add(total: Decimal, flow: Decimal) -> Result<Decimal> {
    total.checked_add(flow).ok_or_else(|| overflow("cumulative flow"))
}

fn overflow(what: &str) -> AmmError {
    AmmError::domain(format!("{} overflows the decimal range", what))
}

pub(crate) fn to_decimal(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| AmmError::domain(format!("{} cannot be represented as a decimal", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_liability_scenario() {
        let ledger = AccountingLedger::with_flows(dec!(5000), dec!(-100), dec!(-80));
        assert_eq!(ledger.assets(), dec!(5000));
        assert_eq!(ledger.liabilities(dec!(100)).unwrap(), dec!(18000));
        assert_eq!(ledger.equity(dec!(100)).unwrap(), dec!(-13000));
    }

    #[test]
    fn test_overflowing_figures_are_errors() {
        let ledger = AccountingLedger::with_flows(dec!(0), dec!(-500_000_000_000_000_000_000), dec!(0));
        assert!(matches!(ledger.liabilities(dec!(10_000_000_000)), Err(AmmError::Domain(_))));
        assert!(matches!(ledger.equity(dec!(10_000_000_000)), Err(AmmError::Domain(_))));

        let mut full = AccountingLedger::with_flows(Decimal::MAX, dec!(0), dec!(0));
        let before = full.clone();
        assert!(full.record_swap(Token::Coin, 1e20, Token::Long, 1.0).is_err());
        assert!(full.record_mint_redeem(-1e20, -1.0).is_err());
        assert_eq!(full, before);
    }

    #[test]
    fn test_swap_flows_signed_from_pool_side() {
        let mut ledger = AccountingLedger::new();
        ledger.record_swap(Token::Coin, 250.0, Token::Long, 4.5).unwrap();
        ledger.record_swap(Token::Short, 2.0, Token::Coin, 80.0).unwrap();

        assert_eq!(ledger.cumulative(Token::Coin), dec!(170));
        assert_eq!(ledger.cumulative(Token::Long), dec!(-4.5));
        assert_eq!(ledger.cumulative(Token::Short), dec!(2));
    }

    #[test]
    fn test_mint_and_liquidity_flows() {
        let mut ledger = AccountingLedger::new();
        ledger.record_mint_redeem(500.0, 5.0).unwrap();
        ledger.record_liquidity(1000.0).unwrap();
        ledger.record_liquidity(-250.0).unwrap();

        assert_eq!(ledger.assets(), dec!(-500));
        assert_eq!(ledger.cumulative(Token::Long), dec!(5));
        assert_eq!(ledger.cumulative(Token::Short), dec!(5));
        assert_eq!(ledger.net_deposits(), dec!(750));
    }

    #[test]
    fn test_non_finite_flow_rejected() {
        let mut ledger = AccountingLedger::new();
        let err = ledger.record_swap(Token::Coin, f64::NAN, Token::Long, 1.0).unwrap_err();
        assert!(matches!(err, AmmError::Domain(_)));
        assert_eq!(ledger, AccountingLedger::new());
    }
}
