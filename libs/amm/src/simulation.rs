//! Repeated-trade simulation over a fresh pool
//!
//! Seeds a pool from a liquidity amount, then buys long and short tokens
//! with coin in equal rounds and records how the pool value, invariant,
//! risk split and liabilities evolve.

use crate::error::{ensure_finite, ensure_unit_interval, AmmError, Result};
use crate::pool::PoolState;
use crate::swap::Swap;
use crate::token::{Balances, Token};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSimulator {
    /// Coin value put into the pool at the start
    pub initial_liquidity: f64,
    /// Share of the initial liquidity kept as coin; the rest is split into
    /// equal long and short balances at `C` per token
    pub coin_fraction: f64,
    /// Coin spent by traders over the whole run
    pub trade_volume: f64,
    /// Share of the volume spent on long tokens
    pub f_long: f64,
    pub n_trades: usize,
    pub collateral_per_pair: f64,
    pub swap_fee: f64,
    /// Reweight at the oracle price after every swap
    pub reweight: bool,
}

impl Default for TradeSimulator {
    fn default() -> Self {
        Self {
            initial_liquidity: 1_000_000.0,
            coin_fraction: 0.5,
            trade_volume: 100_000.0,
            f_long: 0.6,
            n_trades: 10,
            collateral_per_pair: 100.0,
            swap_fee: 0.0,
            reweight: true,
        }
    }
}

/// Per-round pool metric tracked by a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesField {
    TotalValue,
    Invariant,
    Safe,
    Unsafe,
    Liabilities,
}

impl SeriesField {
    pub fn name(&self) -> &'static str {
        match self {
            SeriesField::TotalValue => "total_value",
            SeriesField::Invariant => "invariant",
            SeriesField::Safe => "safe",
            SeriesField::Unsafe => "unsafe",
            SeriesField::Liabilities => "liabilities",
        }
    }
}

impl fmt::Display for SeriesField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeriesField {
    type Err = AmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "total_value" => Ok(SeriesField::TotalValue),
            "invariant" => Ok(SeriesField::Invariant),
            "safe" => Ok(SeriesField::Safe),
            "unsafe" => Ok(SeriesField::Unsafe),
            "liabilities" => Ok(SeriesField::Liabilities),
            other => Err(AmmError::domain(format!("unknown series field '{}'", other))),
        }
    }
}

/// Result of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub price: f64,
    pub long_swaps: Vec<Swap>,
    pub short_swaps: Vec<Swap>,
    /// One entry before trading plus one per round
    pub total_value: Vec<f64>,
    pub invariant: Vec<f64>,
    pub safe: Vec<f64>,
    pub unsafe_balance: Vec<f64>,
    pub liabilities: Vec<Decimal>,
    /// Long tokens the long volume buys at the initial spot price
    pub fair_long: f64,
    /// Short tokens the short volume buys at the initial spot price
    pub fair_short: f64,
    pub final_state: PoolState,
}

impl SimulationReport {
    pub fn actual_long(&self) -> f64 {
        self.long_swaps.iter().map(|s| s.amount_out).sum()
    }

    pub fn actual_short(&self) -> f64 {
        self.short_swaps.iter().map(|s| s.amount_out).sum()
    }

    /// Shortfall of long tokens received versus the fair amount
    pub fn slippage_long(&self) -> f64 {
        1.0 - self.actual_long() / self.fair_long
    }

    pub fn slippage_short(&self) -> f64 {
        1.0 - self.actual_short() / self.fair_short
    }

    pub fn series(&self, field: SeriesField) -> Vec<f64> {
        match field {
            SeriesField::TotalValue => self.total_value.clone(),
            SeriesField::Invariant => self.invariant.clone(),
            SeriesField::Safe => self.safe.clone(),
            SeriesField::Unsafe => self.unsafe_balance.clone(),
            SeriesField::Liabilities => self
                .liabilities
                .iter()
                .map(|l| l.to_f64().unwrap_or(f64::NAN))
                .collect(),
        }
    }
}

/// One series field evaluated over a set of oracle prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlGrid {
    pub field: SeriesField,
    /// Column labels
    pub prices: Vec<f64>,
    /// Row labels: cumulative volume traded after each round
    pub volumes: Vec<f64>,
    /// `values[row][column]`, relative to the column's initial pool value.
    /// Total value is reported as a return (`value / initial - 1`).
    pub values: Vec<Vec<f64>>,
}

impl TradeSimulator {
    pub fn validate(&self) -> Result<()> {
        ensure_finite("initial_liquidity", self.initial_liquidity)?;
        if self.initial_liquidity <= 0.0 {
            return Err(AmmError::domain("initial liquidity must be positive"));
        }
        ensure_unit_interval("coin_fraction", self.coin_fraction)?;
        ensure_finite("trade_volume", self.trade_volume)?;
        if self.trade_volume <= 0.0 {
            return Err(AmmError::domain("trade volume must be positive"));
        }
        ensure_finite("f_long", self.f_long)?;
        if !(self.f_long > 0.0 && self.f_long < 1.0) {
            return Err(AmmError::domain(format!(
                "f_long must lie strictly between 0 and 1, got {}",
                self.f_long
            )));
        }
        if self.n_trades == 0 {
            return Err(AmmError::domain("at least one trade round is required"));
        }
        Ok(())
    }

    /// Fresh pool at normalized price `price`
    pub fn initial_pool(&self, price: f64) -> Result<PoolState> {
        let coin = self.initial_liquidity * self.coin_fraction;
        let position = self.initial_liquidity / self.collateral_per_pair * (1.0 - self.coin_fraction);
        PoolState::new(
            Balances::new(coin, position, position),
            price,
            self.collateral_per_pair,
        )?
        .with_swap_fee(self.swap_fee)
    }

    /// Run `n_trades` rounds of long and short purchases at `price`
    pub fn simulate(&self, price: f64) -> Result<SimulationReport> {
        self.validate()?;
        let mut pool = self.initial_pool(price)?;

        let long_volume = self.trade_volume * self.f_long;
        let short_volume = self.trade_volume - long_volume;
        let fair_long = long_volume / pool.spot_price(Token::Long)?;
        let fair_short = short_volume / pool.spot_price(Token::Short)?;

        let rounds = self.n_trades;
        let long_trade = long_volume / rounds as f64;
        let short_trade = short_volume / rounds as f64;

        let mut report = SimulationReport {
            price,
            long_swaps: Vec::with_capacity(rounds),
            short_swaps: Vec::with_capacity(rounds),
            total_value: Vec::with_capacity(rounds + 1),
            invariant: Vec::with_capacity(rounds + 1),
            safe: Vec::with_capacity(rounds + 1),
            unsafe_balance: Vec::with_capacity(rounds + 1),
            liabilities: Vec::with_capacity(rounds + 1),
            fair_long,
            fair_short,
            final_state: pool.clone(),
        };
        record_round(&mut report, &pool)?;

        for _ in 0..rounds {
            report
                .long_swaps
                .push(pool.swap(Token::Coin, long_trade, Token::Long, self.reweight)?);
            report
                .short_swaps
                .push(pool.swap(Token::Coin, short_trade, Token::Short, self.reweight)?);
            record_round(&mut report, &pool)?;
        }

        info!(
            price,
            actual_long = report.actual_long(),
            fair_long,
            actual_short = report.actual_short(),
            fair_short,
            "simulation finished"
        );
        report.final_state = pool;
        Ok(report)
    }

    /// Evaluate `field` over `prices` (the default 0.1..0.9 grid when
    /// `None`), one simulation per price
    pub fn pnl_grid(&self, prices: Option<&[f64]>, field: SeriesField) -> Result<PnlGrid> {
        let defaults;
        let prices = match prices {
            Some(prices) => prices,
            None => {
                defaults = Self::default_prices();
                &defaults[..]
            }
        };
        let rows = self.n_trades + 1;
        let mut values = vec![Vec::with_capacity(prices.len()); rows];

        for &price in prices {
            let report = self.simulate(price)?;
            let base = report.total_value[0];
            for (row, value) in report.series(field).into_iter().enumerate() {
                let scaled = match field {
                    SeriesField::TotalValue => value / base - 1.0,
                    _ => value / base,
                };
                values[row].push(scaled);
            }
        }

        let volumes = (0..rows)
            .map(|i| self.trade_volume * i as f64 / self.n_trades as f64)
            .collect();
        Ok(PnlGrid {
            field,
            prices: prices.to_vec(),
            volumes,
            values,
        })
    }

    /// Oracle prices 0.1, 0.2, ..., 0.9
    pub fn default_prices() -> Vec<f64> {
        (1..10).map(|i| i as f64 / 10.0).collect()
    }
}

fn record_round(report: &mut SimulationReport, pool: &PoolState) -> Result<()> {
    report.total_value.push(pool.total_value());
    report.invariant.push(pool.invariant());
    report.safe.push(pool.safe_balance());
    report.unsafe_balance.push(pool.unsafe_balance());
    report.liabilities.push(pool.liabilities()?);
    Ok(())
}
