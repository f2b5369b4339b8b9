//! Long/short pool state and its actions
//!
//! `PoolState` is the single aggregate root of the engine: balances,
//! weights, normalized price, collateral per pair, swap fee and the
//! accounting ledger. Every mutating method works on a copy and commits it
//! only when the whole action succeeded, so a failed call never leaves a
//! partially applied state behind.

use crate::error::{ensure_finite, ensure_unit_interval, AmmError, Result};
use crate::ledger::{to_decimal, AccountingLedger};
use crate::settings::PoolSettings;
use crate::swap::Swap;
use crate::token::{Balances, Token, Weights};
use crate::weighted_math::WeightedMath;
use crate::weights::{WeightSolver, SINGLE_ASSET_WEIGHTS};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How the target price is chosen when liquidity changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalancePolicy {
    /// Externally supplied oracle price
    #[default]
    Oracle,
    /// Price currently implied by the pool itself
    Amm,
    /// Pool and oracle prices blended by existing vs. new liquidity
    Weighted,
}

impl RebalancePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            RebalancePolicy::Oracle => "oracle",
            RebalancePolicy::Amm => "amm",
            RebalancePolicy::Weighted => "weighted",
        }
    }
}

impl fmt::Display for RebalancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RebalancePolicy {
    type Err = AmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oracle" => Ok(RebalancePolicy::Oracle),
            "amm" => Ok(RebalancePolicy::Amm),
            "weighted" => Ok(RebalancePolicy::Weighted),
            other => Err(AmmError::domain(format!("unknown rebalance policy '{}'", other))),
        }
    }
}

/// Price the weights are re-derived for after a mint or redeem
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceTarget {
    /// Normalized oracle price in `[0, 1]`
    Oracle(f64),
    /// Price implied by the post-action balances and current weights
    Implied,
}

/// Snapshot and owner of all pool state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    balances: Balances,
    weights: Weights,
    price: f64,
    collateral_per_pair: Decimal,
    swap_fee: f64,
    /// Outstanding liquidity-provider shares
    lp_tokens: f64,
    ledger: AccountingLedger,
}

impl PoolState {
    /// Create a pool and derive its weights for `price`
    pub fn new(balances: Balances, price: f64, collateral_per_pair: f64) -> Result<Self> {
        ensure_finite("collateral_per_pair", collateral_per_pair)?;
        let collateral = to_decimal(collateral_per_pair)?;
        let weights = WeightSolver::solve(&balances, price, decimal_to_f64(collateral))?;
        let mut pool = Self {
            balances,
            weights,
            price,
            collateral_per_pair: collateral,
            swap_fee: 0.0,
            lp_tokens: 0.0,
            ledger: AccountingLedger::new(),
        };
        // shares start at one coin of pool value each
        pool.lp_tokens = pool.total_value();
        Ok(pool)
    }

    /// Pool described by a settings block
    pub fn from_settings(settings: &PoolSettings) -> Result<Self> {
        Self::new(
            Balances::new(settings.coin, settings.long, settings.short),
            settings.price,
            settings.collateral_per_pair,
        )?
        .with_swap_fee(settings.swap_fee)
    }

    /// Charge `fee` (fraction of each swap input) on every swap
    pub fn with_swap_fee(mut self, fee: f64) -> Result<Self> {
        ensure_finite("swap_fee", fee)?;
        if !(0.0..1.0).contains(&fee) {
            return Err(AmmError::domain(format!("swap fee must lie in [0, 1), got {}", fee)));
        }
        self.swap_fee = fee;
        Ok(self)
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Normalized price `v`
    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn collateral_per_pair(&self) -> f64 {
        decimal_to_f64(self.collateral_per_pair)
    }

    pub fn swap_fee(&self) -> f64 {
        self.swap_fee
    }

    pub fn ledger(&self) -> &AccountingLedger {
        &self.ledger
    }

    pub fn lp_tokens(&self) -> f64 {
        self.lp_tokens
    }

    /// Pool value per liquidity-provider share
    pub fn lp_price(&self) -> Result<f64> {
        if self.lp_tokens <= 0.0 {
            return Err(AmmError::domain("pool has no outstanding LP shares"));
        }
        Ok(self.total_value() / self.lp_tokens)
    }

    /// Reissue LP shares so that each is worth `lp_price` coin
    pub fn rebase(&mut self, lp_price: f64) -> Result<()> {
        ensure_finite("lp_price", lp_price)?;
        if lp_price <= 0.0 {
            return Err(AmmError::domain(format!("LP price must be positive, got {}", lp_price)));
        }
        self.lp_tokens = self.total_value() / lp_price;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Prices and valuation
    // ---------------------------------------------------------------------

    pub fn invariant(&self) -> f64 {
        WeightedMath::invariant(&self.balances, &self.weights)
    }

    /// Spot price of `token` in coin
    pub fn spot_price(&self, token: Token) -> Result<f64> {
        if token == Token::Coin {
            return Ok(1.0);
        }
        let balance = self.balances[token];
        if balance <= 0.0 || self.weights.coin <= 0.0 {
            return Err(AmmError::degenerate(format!(
                "{} spot price undefined with {} balance {} and coin weight {}",
                token, token, balance, self.weights.coin
            )));
        }
        Ok(self.weights[token] / self.weights.coin * self.balances.coin / balance)
    }

    /// Long and short spot prices, zero where a price is undefined
    pub fn position_prices(&self) -> (f64, f64) {
        (
            self.spot_price(Token::Long).unwrap_or(0.0),
            self.spot_price(Token::Short).unwrap_or(0.0),
        )
    }

    /// Normalized price implied by the pool: `p_l / (p_l + p_s)`
    pub fn implied_price(&self) -> Result<f64> {
        let long = self.spot_price(Token::Long)?;
        let short = self.spot_price(Token::Short)?;
        let total = long + short;
        if total <= 0.0 {
            return Err(AmmError::degenerate("long and short spot prices are both zero"));
        }
        Ok(long / total)
    }

    /// Price of `token` absent any imbalance
    pub fn fair_price(&self, token: Token) -> f64 {
        let c = self.collateral_per_pair();
        match token {
            Token::Coin => 1.0,
            Token::Long => self.price * c,
            Token::Short => (1.0 - self.price) * c,
        }
    }

    /// Pool value in coin units
    pub fn total_value(&self) -> f64 {
        self.balances.coin / self.weights.coin
    }

    /// Coin plus position tokens valued at spot
    pub fn pool_balance(&self) -> f64 {
        let (p_l, p_s) = self.position_prices();
        self.balances.coin + self.balances.long * p_l + self.balances.short * p_s
    }

    /// Coin plus matched long/short pairs
    pub fn safe_balance(&self) -> f64 {
        let (p_l, p_s) = self.position_prices();
        let paired = self.balances.paired();
        p_l * paired + p_s * paired + self.balances.coin
    }

    /// Net directional exposure
    pub fn unsafe_balance(&self) -> f64 {
        self.total_value() - self.safe_balance()
    }

    pub fn assets(&self) -> Decimal {
        self.ledger.assets()
    }

    /// Fails when the figure leaves the decimal range
    pub fn liabilities(&self) -> Result<Decimal> {
        self.ledger.liabilities(self.collateral_per_pair)
    }

    pub fn equity(&self) -> Result<Decimal> {
        self.ledger.equity(self.collateral_per_pair)
    }

    // ---------------------------------------------------------------------
    // Quotes
    // ---------------------------------------------------------------------

    /// Output amount for swapping `amount_in` of `token_in`
    pub fn amount_out(&self, token_in: Token, amount_in: f64, token_out: Token) -> Result<f64> {
        ensure_pair(token_in, token_out)?;
        WeightedMath::out_given_in(
            self.balances[token_out],
            self.weights[token_out],
            self.balances[token_in],
            self.weights[token_in],
            amount_in,
            self.swap_fee,
        )
    }

    /// Input amount of `token_in` needed to receive `amount_out` of `token_out`
    pub fn amount_in(&self, token_in: Token, amount_out: f64, token_out: Token) -> Result<f64> {
        ensure_pair(token_in, token_out)?;
        WeightedMath::in_given_out(
            self.balances[token_out],
            self.weights[token_out],
            self.balances[token_in],
            self.weights[token_in],
            amount_out,
            self.swap_fee,
        )
    }

    /// Average price of a trade sized by its input
    pub fn trade_price(&self, token_in: Token, amount_in: f64, token_out: Token) -> Result<f64> {
        let amount_out = self.amount_out(token_in, amount_in, token_out)?;
        Ok(average_price(token_in, amount_in, amount_out))
    }

    /// Average price of a trade sized by its output
    pub fn trade_price_out(&self, token_in: Token, amount_out: f64, token_out: Token) -> Result<f64> {
        let amount_in = self.amount_in(token_in, amount_out, token_out)?;
        Ok(average_price(token_in, amount_in, amount_out))
    }

    // ---------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------

    /// Swap `amount_in` of `token_in` for `token_out`, optionally reweighting
    /// at the current oracle price afterwards
    pub fn swap(
        &mut self,
        token_in: Token,
        amount_in: f64,
        token_out: Token,
        reweight: bool,
    ) -> Result<Swap> {
        let rebalance = reweight.then_some(PriceTarget::Oracle(self.price));
        self.swap_rebalanced(token_in, amount_in, token_out, rebalance)
    }

    /// Swap, then re-derive weights for `rebalance` when given
    ///
    /// `PriceTarget::Implied` rebalances at the price implied by the
    /// post-trade balances, so the pool keeps the price the trade moved it to.
    pub fn swap_rebalanced(
        &mut self,
        token_in: Token,
        amount_in: f64,
        token_out: Token,
        rebalance: Option<PriceTarget>,
    ) -> Result<Swap> {
        if !(amount_in > 0.0) {
            return Err(AmmError::domain(format!(
                "swap amount must be positive, got {}",
                amount_in
            )));
        }
        let amount_out = self.amount_out(token_in, amount_in, token_out)?;
        let available = self.balances[token_out];
        if amount_out >= available {
            return Err(AmmError::InsufficientBalance {
                token: token_out,
                requested: amount_out,
                available,
            });
        }
        if amount_out <= 0.0 {
            return Err(AmmError::domain(format!(
                "swap of {} {} yields no {}",
                amount_in, token_in, token_out
            )));
        }

        let priced_token = if token_in.is_position() { token_in } else { token_out };
        let initial_spot = self.spot_price(priced_token)?;

        let mut next = self.clone();
        next.balances[token_in] += amount_in;
        next.balances[token_out] -= amount_out;
        let post_trade_spot = next.spot_price(priced_token)?;
        if let Some(target) = rebalance {
            next.rebalance_to(target)?;
        }
        let final_spot = next.spot_price(priced_token)?;
        next.ledger.record_swap(token_in, amount_in, token_out, amount_out)?;
        next.check_ledger()?;

        let swap = Swap {
            token_in,
            amount_in,
            token_out,
            amount_out,
            priced_token,
            initial_spot,
            trade_price: average_price(token_in, amount_in, amount_out),
            post_trade_spot,
            final_spot,
            fair_price: next.fair_price(priced_token),
        };
        debug!(
            token_in = %token_in,
            amount_in,
            token_out = %token_out,
            amount_out,
            trade_price = swap.trade_price,
            rebalanced = rebalance.is_some(),
            "swap executed"
        );

        *self = next;
        Ok(swap)
    }

    /// Swap for an exact `amount_out` of `token_out`
    pub fn swap_given_out(
        &mut self,
        token_in: Token,
        amount_out: f64,
        token_out: Token,
        reweight: bool,
    ) -> Result<Swap> {
        let amount_in = self.amount_in(token_in, amount_out, token_out)?;
        self.swap(token_in, amount_in, token_out, reweight)
    }

    /// Re-derive weights for the current balances, optionally moving the price first
    ///
    /// The invariant jumps: this is how an external price correction is
    /// absorbed without a swap.
    pub fn reweight(&mut self, new_price: Option<f64>) -> Result<()> {
        let price = new_price.unwrap_or(self.price);
        let weights = WeightSolver::solve(&self.balances, price, self.collateral_per_pair())?;
        if price != self.price {
            info!(old_price = self.price, new_price = price, "pool price updated");
        }
        self.price = price;
        self.weights = weights;
        Ok(())
    }

    /// Change the collateral backing each pair and re-derive weights
    pub fn update_collateral(&mut self, collateral_per_pair: f64) -> Result<()> {
        ensure_finite("collateral_per_pair", collateral_per_pair)?;
        let collateral = to_decimal(collateral_per_pair)?;
        let weights = WeightSolver::solve(&self.balances, self.price, decimal_to_f64(collateral))?;
        let mut next = self.clone();
        next.collateral_per_pair = collateral;
        next.weights = weights;
        next.check_ledger()?;
        info!(
            old_collateral = %self.collateral_per_pair,
            new_collateral = %collateral,
            "collateral per pair updated"
        );
        *self = next;
        Ok(())
    }

    /// Mint (`coin_delta >= 0`) or redeem (`coin_delta < 0`) long/short pairs
    /// at `C` coin per pair
    ///
    /// Returns the signed number of pairs issued. With `rebalance` set the
    /// weights are re-derived for the requested price afterwards.
    pub fn mint_redeem(&mut self, coin_delta: f64, rebalance: Option<PriceTarget>) -> Result<f64> {
        let mut next = self.clone();
        let pairs = next.apply_mint_redeem(coin_delta)?;
        if let Some(target) = rebalance {
            next.rebalance_to(target)?;
        }
        next.check_ledger()?;
        *self = next;
        Ok(pairs)
    }

    /// Add (`amount > 0`) or remove (`amount < 0`) coin liquidity
    ///
    /// `token_fraction` of the amount is converted into long/short pairs
    /// (minted on deposit, redeemed on withdrawal); the rest moves the coin
    /// balance directly. Weights are then re-derived for the price chosen by
    /// `policy`. LP shares are issued or burned at the pre-action LP price.
    /// Returns the signed number of pairs issued.
    pub fn deposit_withdraw(
        &mut self,
        amount: f64,
        oracle_price: f64,
        policy: RebalancePolicy,
        token_fraction: f64,
    ) -> Result<f64> {
        ensure_finite("amount", amount)?;
        if amount == 0.0 {
            return Err(AmmError::domain("liquidity amount must be non-zero"));
        }
        ensure_unit_interval("oracle_price", oracle_price)?;
        ensure_unit_interval("token_fraction", token_fraction)?;
        if amount < 0.0 && policy == RebalancePolicy::Weighted {
            return Err(AmmError::NotImplemented(
                "weighted rebalance for withdrawals".to_string(),
            ));
        }

        let target = match policy {
            RebalancePolicy::Oracle => oracle_price,
            RebalancePolicy::Amm => self.implied_price()?,
            RebalancePolicy::Weighted => {
                let existing = self.total_value();
                let implied = self.implied_price()?;
                (existing * implied + amount * oracle_price) / (existing + amount)
            }
        };

        let shares = if self.lp_tokens > 0.0 && self.total_value() > 0.0 {
            amount * self.lp_tokens / self.total_value()
        } else {
            amount
        };
        if -shares > self.lp_tokens {
            return Err(AmmError::domain(format!(
                "withdrawal burns {} LP shares but only {} are outstanding",
                -shares, self.lp_tokens
            )));
        }

        let converted = amount * token_fraction;
        let mut next = self.clone();
        let pairs = if amount > 0.0 {
            next.balances.coin += amount;
            next.apply_mint_redeem(converted)?
        } else {
            let pairs = next.apply_mint_redeem(converted)?;
            let withdrawn = -amount;
            if withdrawn > next.balances.coin {
                return Err(AmmError::InsufficientCoin {
                    requested: withdrawn,
                    available: next.balances.coin,
                });
            }
            next.balances.coin -= withdrawn;
            pairs
        };
        next.ledger.record_liquidity(amount)?;
        next.lp_tokens += shares;
        next.reweight(Some(target))?;
        next.check_ledger()?;

        debug!(amount, pairs, shares, policy = %policy, target_price = target, "liquidity changed");
        *self = next;
        Ok(pairs)
    }

    fn apply_mint_redeem(&mut self, coin_delta: f64) -> Result<f64> {
        ensure_finite("coin_delta", coin_delta)?;
        let pairs = coin_delta / self.collateral_per_pair();
        if coin_delta >= 0.0 {
            if coin_delta > self.balances.coin {
                return Err(AmmError::InsufficientCoin {
                    requested: coin_delta,
                    available: self.balances.coin,
                });
            }
        } else {
            let available_pairs = self.balances.paired();
            if -pairs > available_pairs {
                return Err(AmmError::InsufficientPositionTokens {
                    requested_pairs: -pairs,
                    available_pairs,
                });
            }
        }

        self.balances.coin -= coin_delta;
        self.balances.long += pairs;
        self.balances.short += pairs;
        self.ledger.record_mint_redeem(coin_delta, pairs)?;

        if self.balances.long == 0.0 || self.balances.short == 0.0 {
            warn!(coin = self.balances.coin, "all pairs redeemed, pool weights collapse to coin");
            self.weights = SINGLE_ASSET_WEIGHTS;
        } else if self.balances.coin == 0.0 {
            return Err(AmmError::degenerate(
                "mint consumed all coin while position tokens remain",
            ));
        }
        debug!(coin_delta, pairs, "pairs minted/redeemed");
        Ok(pairs)
    }

    /// Ledger figures must stay representable before a state is committed
    fn check_ledger(&self) -> Result<()> {
        self.equity().map(|_| ())
    }

    fn rebalance_to(&mut self, target: PriceTarget) -> Result<()> {
        let price = match target {
            PriceTarget::Oracle(price) => price,
            PriceTarget::Implied => self.implied_price()?,
        };
        self.reweight(Some(price))
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (p_l, p_s) = self.position_prices();
        let b = &self.balances;
        writeln!(f, "AMM Balance: {:.2}", self.total_value())?;
        writeln!(
            f,
            " = {:.2} (safe) + {:.2} (risk)",
            self.safe_balance(),
            self.unsafe_balance()
        )?;
        writeln!(
            f,
            " = {:.2} coin + {:.2} long @ {:.2} ({:.2}) + {:.2} short @ {:.2} ({:.2})",
            b.coin,
            b.long,
            p_l,
            b.long * p_l,
            b.short,
            p_s,
            b.short * p_s
        )?;
        if let Ok(lp_price) = self.lp_price() {
            writeln!(f, "  LP Token Price: {:.2}", lp_price)?;
        }
        match (self.liabilities(), self.equity()) {
            (Ok(liabilities), Ok(equity)) => {
                writeln!(
                    f,
                    "  Cumulative Trades:  Assets {:.2}  Maximum Liabilities {:.2}",
                    self.assets(),
                    liabilities
                )?;
                write!(f, "  Trade Equity: {:.2}", equity)
            }
            _ => write!(f, "  Cumulative Trades: out of decimal range"),
        }
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn ensure_pair(token_in: Token, token_out: Token) -> Result<()> {
    if token_in == token_out {
        return Err(AmmError::domain(format!("cannot swap {} for itself", token_in)));
    }
    Ok(())
}

/// Coin per position token when coin is involved, otherwise output per input
fn average_price(token_in: Token, amount_in: f64, amount_out: f64) -> f64 {
    if token_in == Token::Coin {
        amount_in / amount_out
    } else {
        amount_out / amount_in
    }
}
