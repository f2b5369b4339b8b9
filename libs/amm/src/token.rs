//! Pool tokens and per-token quantities

use crate::error::AmmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// The three tokens held by a long/short pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    /// Collateral / numeraire
    Coin,
    Long,
    Short,
}

impl Token {
    /// All tokens in pool order (coin, long, short)
    pub const ALL: [Token; 3] = [Token::Coin, Token::Long, Token::Short];

    pub fn name(&self) -> &'static str {
        match self {
            Token::Coin => "coin",
            Token::Long => "long",
            Token::Short => "short",
        }
    }

    /// Long or short
    pub fn is_position(&self) -> bool {
        !matches!(self, Token::Coin)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Token {
    type Err = AmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coin" => Ok(Token::Coin),
            "long" => Ok(Token::Long),
            "short" => Ok(Token::Short),
            _ => Err(AmmError::UnknownToken(s.to_string())),
        }
    }
}

/// Ordered (coin, long, short) triple used for balances, weights and flows
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenVector {
    pub coin: f64,
    pub long: f64,
    pub short: f64,
}

impl TokenVector {
    pub const fn new(coin: f64, long: f64, short: f64) -> Self {
        Self { coin, long, short }
    }

    pub fn sum(&self) -> f64 {
        self.coin + self.long + self.short
    }

    /// Number of complete long/short pairs
    pub fn paired(&self) -> f64 {
        self.long.min(self.short)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, f64)> + '_ {
        Token::ALL.into_iter().map(move |token| (token, self[token]))
    }
}

impl Index<Token> for TokenVector {
    type Output = f64;

    fn index(&self, token: Token) -> &f64 {
        match token {
            Token::Coin => &self.coin,
            Token::Long => &self.long,
            Token::Short => &self.short,
        }
    }
}

impl IndexMut<Token> for TokenVector {
    fn index_mut(&mut self, token: Token) -> &mut f64 {
        match token {
            Token::Coin => &mut self.coin,
            Token::Long => &mut self.long,
            Token::Short => &mut self.short,
        }
    }
}

/// Pool token balances
pub type Balances = TokenVector;

/// Weighted-product exponents; sum to one
pub type Weights = TokenVector;
