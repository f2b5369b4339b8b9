//! Named-action dispatch and trajectory replay
//!
//! The sequencer never mutates the caller's pool: every action runs on a
//! copy and returns the resulting snapshot together with the token amount
//! produced and its average price.

use crate::error::{AmmError, Result};
use crate::pool::{PoolState, PriceTarget, RebalancePolicy};
use crate::settings::RebalanceSettings;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Pool actions understood by the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Pay coin, receive `params.token`
    SwapFromCoin,
    /// Pay `params.token`, receive coin
    SwapToCoin,
    /// Mint (positive amount) or redeem (negative amount) pairs
    MintRedeem,
    Deposit,
    Withdraw,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::SwapFromCoin => "swap_from_coin",
            ActionKind::SwapToCoin => "swap_to_coin",
            ActionKind::MintRedeem => "mint_redeem",
            ActionKind::Deposit => "deposit",
            ActionKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = AmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "swap_from_coin" => Ok(ActionKind::SwapFromCoin),
            "swap_to_coin" => Ok(ActionKind::SwapToCoin),
            "mint_redeem" => Ok(ActionKind::MintRedeem),
            "deposit" => Ok(ActionKind::Deposit),
            "withdraw" => Ok(ActionKind::Withdraw),
            _ => Err(AmmError::UnknownAction(s.to_string())),
        }
    }
}

/// Per-action parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionParams {
    /// Position token traded by the swap actions
    pub token: Token,
    /// Rebalance after a swap or mint/redeem; liquidity changes always rebalance
    pub reweight: bool,
    /// Oracle price for every action; the pool price when unset
    pub oracle_price: Option<f64>,
    /// Where the rebalance price comes from
    pub policy: RebalancePolicy,
    pub token_fraction: f64,
}

impl Default for ActionParams {
    fn default() -> Self {
        Self {
            token: Token::Long,
            reweight: true,
            oracle_price: None,
            policy: RebalancePolicy::Oracle,
            token_fraction: 0.5,
        }
    }
}

impl ActionParams {
    pub fn from_settings(settings: &RebalanceSettings) -> Self {
        Self {
            reweight: settings.auto_reweight,
            policy: settings.policy,
            token_fraction: settings.token_fraction,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    pub fn with_reweight(mut self, reweight: bool) -> Self {
        self.reweight = reweight;
        self
    }

    pub fn with_oracle_price(mut self, price: f64) -> Self {
        self.oracle_price = Some(price);
        self
    }

    pub fn with_policy(mut self, policy: RebalancePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// One action to replay against a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub amount: f64,
    #[serde(default)]
    pub params: ActionParams,
}

impl Action {
    pub fn new(kind: ActionKind, amount: f64, params: ActionParams) -> Self {
        Self {
            kind,
            amount,
            params,
        }
    }

    /// Build an action from its name, e.g. `"swap_from_coin"`
    pub fn parse(name: &str, amount: f64, params: ActionParams) -> Result<Self> {
        Ok(Self::new(name.parse()?, amount, params))
    }
}

/// Outcome of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Pool snapshot after the action
    pub state: PoolState,
    /// Position tokens received (swap from coin), coin received (swap to
    /// coin) or pairs issued (negative when redeemed)
    pub token_out: f64,
    /// Coin per position token, or `C` for mint and liquidity actions
    pub avg_price: f64,
}

/// Stateless dispatcher from named actions to pool operations
pub struct ActionSequencer;

impl ActionSequencer {
    /// Apply `action` to a copy of `state`
    pub fn perform_action(state: &PoolState, action: &Action) -> Result<Step> {
        let mut next = state.clone();
        let params = &action.params;
        let oracle_price = params.oracle_price.unwrap_or(state.price());

        let (token_out, avg_price) = match action.kind {
            ActionKind::SwapFromCoin => {
                ensure_position(params.token)?;
                let rebalance = rebalance_target(params, oracle_price)?;
                let swap = next.swap_rebalanced(Token::Coin, action.amount, params.token, rebalance)?;
                (swap.amount_out, swap.trade_price)
            }
            ActionKind::SwapToCoin => {
                ensure_position(params.token)?;
                let rebalance = rebalance_target(params, oracle_price)?;
                let swap = next.swap_rebalanced(params.token, action.amount, Token::Coin, rebalance)?;
                (swap.amount_out, swap.trade_price)
            }
            ActionKind::MintRedeem => {
                let rebalance = rebalance_target(params, oracle_price)?;
                let pairs = next.mint_redeem(action.amount, rebalance)?;
                (pairs, next.collateral_per_pair())
            }
            ActionKind::Deposit => {
                let pairs = next.deposit_withdraw(
                    action.amount.abs(),
                    oracle_price,
                    params.policy,
                    params.token_fraction,
                )?;
                (pairs, next.collateral_per_pair())
            }
            ActionKind::Withdraw => {
                let pairs = next.deposit_withdraw(
                    -action.amount.abs(),
                    oracle_price,
                    params.policy,
                    params.token_fraction,
                )?;
                (pairs, next.collateral_per_pair())
            }
        };

        debug!(action = %action.kind, amount = action.amount, token_out, avg_price, "action performed");
        Ok(Step {
            state: next,
            token_out,
            avg_price,
        })
    }

    /// Lazily replay `actions` from `initial`, each step starting from the
    /// previous step's state
    pub fn trajectory<'a>(initial: &PoolState, actions: &'a [Action]) -> Trajectory<'a> {
        Trajectory {
            state: Some(initial.clone()),
            actions: actions.iter(),
        }
    }

    /// Replay every action, stopping at the first failure
    pub fn run(initial: &PoolState, actions: &[Action]) -> Result<Vec<Step>> {
        Self::trajectory(initial, actions).collect()
    }
}

/// Iterator over the steps of a replay; ends after the first error
pub struct Trajectory<'a> {
    state: Option<PoolState>,
    actions: std::slice::Iter<'a, Action>,
}

impl<'a> Iterator for Trajectory<'a> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = self.state.as_ref()?;
        let Some(action) = self.actions.next() else {
            self.state = None;
            return None;
        };
        match ActionSequencer::perform_action(state, action) {
            Ok(step) => {
                self.state = Some(step.state.clone());
                Some(Ok(step))
            }
            Err(err) => {
                self.state = None;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for Trajectory<'_> {}

/// Price a swap or mint/redeem rebalances to, `None` when reweighting is off
fn rebalance_target(params: &ActionParams, oracle_price: f64) -> Result<Option<PriceTarget>> {
    if !params.reweight {
        return Ok(None);
    }
    match params.policy {
        RebalancePolicy::Oracle => Ok(Some(PriceTarget::Oracle(oracle_price))),
        RebalancePolicy::Amm => Ok(Some(PriceTarget::Implied)),
        RebalancePolicy::Weighted => Err(AmmError::NotImplemented(
            "weighted rebalance for swaps and mint/redeem".to_string(),
        )),
    }
}

fn ensure_position(token: Token) -> Result<()> {
    if token.is_position() {
        Ok(())
    } else {
        Err(AmmError::domain("swap actions trade a long or short token against coin"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Balances;

    fn pool() -> PoolState {
        PoolState::new(Balances::new(10000.0, 1000.0, 1000.0), 0.5, 100.0).unwrap()
    }

    #[test]
    fn test_action_names() {
        for kind in [
            ActionKind::SwapFromCoin,
            ActionKind::SwapToCoin,
            ActionKind::MintRedeem,
            ActionKind::Deposit,
            ActionKind::Withdraw,
        ] {
            assert_eq!(kind.name().parse::<ActionKind>().unwrap(), kind);
        }
        assert_eq!(
            "swap".parse::<ActionKind>().unwrap_err(),
            AmmError::UnknownAction("swap".to_string())
        );
    }

    #[test]
    fn test_perform_action_leaves_input_untouched() {
        let state = pool();
        let action = Action::new(ActionKind::SwapFromCoin, 500.0, ActionParams::default());
        let step = ActionSequencer::perform_action(&state, &action).unwrap();

        assert_eq!(state, pool());
        assert!(step.token_out > 0.0);
        assert!((step.avg_price - 500.0 / step.token_out).abs() < 1e-12);
        assert!((step.state.balances().coin - 10500.0).abs() < 1e-9);
    }

    #[test]
    fn test_swap_to_coin_price() {
        let action = Action::new(
            ActionKind::SwapToCoin,
            2.0,
            ActionParams::default().with_token(Token::Short),
        );
        let step = ActionSequencer::perform_action(&pool(), &action).unwrap();
        assert!((step.avg_price - step.token_out / 2.0).abs() < 1e-12);
        assert!(step.avg_price < 50.0);
    }

    #[test]
    fn test_mint_step_reports_pairs_at_collateral() {
        let action = Action::new(
            ActionKind::MintRedeem,
            1000.0,
            ActionParams::default().with_oracle_price(0.6),
        );
        let step = ActionSequencer::perform_action(&pool(), &action).unwrap();
        assert!((step.token_out - 10.0).abs() < 1e-12);
        assert_eq!(step.avg_price, 100.0);
        assert_eq!(step.state.price(), 0.6);
    }

    #[test]
    fn test_mint_weighted_not_implemented() {
        let action = Action::new(
            ActionKind::MintRedeem,
            1000.0,
            ActionParams::default().with_policy(RebalancePolicy::Weighted),
        );
        assert!(matches!(
            ActionSequencer::perform_action(&pool(), &action),
            Err(AmmError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_mint_without_reweight_keeps_weights() {
        let start = pool();
        let action = Action::new(
            ActionKind::MintRedeem,
            1000.0,
            ActionParams::default().with_reweight(false).with_oracle_price(0.7),
        );
        let step = ActionSequencer::perform_action(&start, &action).unwrap();

        assert_eq!(step.state.price(), 0.5);
        assert_eq!(step.state.weights(), start.weights());
        assert!((step.state.balances().long - 1010.0).abs() < 1e-9);
    }

    #[test]
    fn test_swap_follows_amm_policy() {
        let mut drifted = pool();
        drifted.swap(Token::Coin, 2000.0, Token::Long, false).unwrap();
        let moved_to = drifted.implied_price().unwrap();

        let action = Action::new(
            ActionKind::SwapFromCoin,
            2000.0,
            ActionParams::default().with_policy(RebalancePolicy::Amm),
        );
        let step = ActionSequencer::perform_action(&pool(), &action).unwrap();

        assert!(moved_to > 0.5);
        assert!((step.state.price() - moved_to).abs() < 1e-12);
        assert!((step.state.implied_price().unwrap() - moved_to).abs() < 1e-9);
    }

    #[test]
    fn test_swap_follows_oracle_override() {
        let action = Action::new(
            ActionKind::SwapToCoin,
            5.0,
            ActionParams::default()
                .with_token(Token::Short)
                .with_oracle_price(0.4),
        );
        let step = ActionSequencer::perform_action(&pool(), &action).unwrap();
        assert_eq!(step.state.price(), 0.4);
        assert!((step.state.spot_price(Token::Long).unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_swap_not_implemented() {
        let start = pool();
        for kind in [ActionKind::SwapFromCoin, ActionKind::SwapToCoin] {
            let action = Action::new(
                kind,
                10.0,
                ActionParams::default().with_policy(RebalancePolicy::Weighted),
            );
            assert!(matches!(
                ActionSequencer::perform_action(&start, &action),
                Err(AmmError::NotImplemented(_))
            ));
        }

        // without reweighting the policy is never consulted
        let action = Action::new(
            ActionKind::SwapFromCoin,
            10.0,
            ActionParams::default()
                .with_policy(RebalancePolicy::Weighted)
                .with_reweight(false),
        );
        assert!(ActionSequencer::perform_action(&start, &action).is_ok());
    }

    #[test]
    fn test_swap_action_rejects_coin_token() {
        let action = Action::new(
            ActionKind::SwapFromCoin,
            10.0,
            ActionParams::default().with_token(Token::Coin),
        );
        assert!(matches!(
            ActionSequencer::perform_action(&pool(), &action),
            Err(AmmError::Domain(_))
        ));
    }

    #[test]
    fn test_trajectory_stops_after_error() {
        let actions = vec![
            Action::new(ActionKind::Deposit, 1000.0, ActionParams::default()),
            Action::new(ActionKind::MintRedeem, 1e9, ActionParams::default()),
            Action::new(ActionKind::Withdraw, 100.0, ActionParams::default()),
        ];
        let results: Vec<_> = ActionSequencer::trajectory(&pool(), &actions).collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AmmError::InsufficientCoin { .. })));
        assert!(ActionSequencer::run(&pool(), &actions).is_err());
    }

    #[test]
    fn test_params_from_settings() {
        let settings = RebalanceSettings {
            auto_reweight: false,
            policy: RebalancePolicy::Amm,
            token_fraction: 0.25,
        };
        let params = ActionParams::from_settings(&settings);
        assert!(!params.reweight);
        assert_eq!(params.policy, RebalancePolicy::Amm);
        assert_eq!(params.token_fraction, 0.25);
        assert_eq!(params.token, Token::Long);
    }
}
