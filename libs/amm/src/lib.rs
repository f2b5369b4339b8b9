//! # Long/Short AMM - Constant-Weight Pricing Engine
//!
//! ## Purpose
//!
//! Pricing and accounting engine for a three-token automated market maker
//! holding a collateral coin plus complementary long and short position
//! tokens. Pool weights are derived in closed form so that spot prices
//! track an externally supplied normalized price `v`: long trades at
//! `v * C` and short at `(1 - v) * C`, where `C` is the coin backing one
//! long/short pair.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Initial balances, oracle price updates and trade requests from the deployment layer
//! - **Output Destinations**: Settlement logic (total value, assets, liabilities), reporting and simulation
//! - **Configuration**: [`EngineSettings`] from TOML with `LSAMM__` environment overrides
//! - **Precision**: `f64` for prices, balances and weights; `Decimal` for cumulative ledger flows
//!
//! ## Architecture Role
//!
//! [`PoolState`] is the single aggregate root. It calls [`WeightSolver`] whenever the price
//! or balances require a rebalance and [`WeightedMath`] to price swaps; every action updates
//! its [`AccountingLedger`]. [`ActionSequencer`] threads an ordered list of actions through
//! copies of the pool to produce a replayable trajectory.
//!
//! See [`architecture_diagram()`] for visual representation of the data flow.
//!
//! ## Performance Profile
//!
//! - **Calculation Cost**: Every operation is a bounded closed-form evaluation; no iterative solvers
//! - **Memory Usage**: A pool snapshot is a few dozen bytes plus the ledger
//! - **Concurrency**: Single writer per pool; read-only metrics may be shared between readers

pub mod error;
pub mod ledger;
pub mod pool;
pub mod sequencer;
pub mod settings;
pub mod simulation;
pub mod swap;
pub mod token;
pub mod weighted_math;
pub mod weights;

pub use error::{AmmError, Result};
pub use ledger::AccountingLedger;
pub use pool::{PoolState, PriceTarget, RebalancePolicy};
pub use sequencer::{Action, ActionKind, ActionParams, ActionSequencer, Step, Trajectory};
pub use settings::{EngineSettings, PoolSettings, RebalanceSettings};
pub use simulation::{PnlGrid, SeriesField, SimulationReport, TradeSimulator};
pub use swap::Swap;
pub use token::{Balances, Token, TokenVector, Weights};
pub use weighted_math::WeightedMath;
pub use weights::WeightSolver;

/// Decimal type used by the ledger
pub use rust_decimal::Decimal;

/// Architecture diagram showing the engine's data flow and component relationships
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph LR
///     subgraph Input["📊 Inputs"]
///         OP[Oracle Price v]
///         TR[Trade Requests]
///         LQ[Liquidity Changes]
///         ST[Engine Settings]
///     end
///
///     subgraph Pool["🏦 PoolState"]
///         SW[swap / swap_given_out]
///         RW[reweight]
///         MR[mint_redeem]
///         DW[deposit_withdraw]
///     end
///
///     subgraph Math["🧮 Math"]
///         WS[WeightSolver]
///         WM[WeightedMath]
///     end
///
///     subgraph Output["🎯 Outputs"]
///         LG[AccountingLedger]
///         SR[Swap Records]
///         TJ[Trajectories]
///         SM[Simulation Reports]
///     end
///
///     ST --> Pool
///     OP --> RW
///     TR --> SW
///     LQ --> DW
///     LQ --> MR
///
///     SW --> WM
///     RW --> WS
///     MR --> WS
///     DW --> WS
///
///     SW --> SR
///     Pool --> LG
///     Pool --> TJ
///     TJ --> SM
///
///     style Input fill:#e1f5fe
///     style Pool fill:#fff3e0
///     style Math fill:#f3e5f5
///     style Output fill:#e8f5e9
/// ```
pub fn architecture_diagram() {
    // This function exists solely for documentation purposes
    // The diagram is rendered by aquamarine in rustdoc
}
