//! Native token amounts.
//!
//! Amounts travel over the wire as decimal strings (`{"denom": "uluna",
//! "amount": "500000"}`) and are held as `u128` in memory.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoinParseError {
	#[error("Missing amount in coin: {0}")]
	MissingAmount(String),
	#[error("Missing denom in coin: {0}")]
	MissingDenom(String),
	#[error("Invalid amount in coin {0}: {1}")]
	InvalidAmount(String, String),
}

/// A single denomination and amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
	pub denom: String,
	#[serde(
		serialize_with = "serialize_amount",
		deserialize_with = "deserialize_amount"
	)]
	pub amount: u128,
}

impl Coin {
	pub fn new(amount: u128, denom: impl Into<String>) -> Self {
		Self {
			denom: denom.into(),
			amount,
		}
	}
}

impl fmt::Display for Coin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.amount, self.denom)
	}
}

/// Parses the `500000uluna` notation used on the command line and in config.
impl FromStr for Coin {
	type Err = CoinParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		let split = s
			.find(|c: char| !c.is_ascii_digit())
			.ok_or_else(|| CoinParseError::MissingDenom(s.to_string()))?;
		if split == 0 {
			return Err(CoinParseError::MissingAmount(s.to_string()));
		}

		let (amount, denom) = s.split_at(split);
		let amount = amount
			.parse::<u128>()
			.map_err(|e| CoinParseError::InvalidAmount(s.to_string(), e.to_string()))?;

		Ok(Coin::new(amount, denom))
	}
}

/// An ordered list of coins, as attached to messages and fees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(pub Vec<Coin>);

impl Coins {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn amount_of(&self, denom: &str) -> u128 {
		self.0
			.iter()
			.filter(|c| c.denom == denom)
			.map(|c| c.amount)
			.sum()
	}
}

impl From<Vec<Coin>> for Coins {
	fn from(coins: Vec<Coin>) -> Self {
		Coins(coins)
	}
}

/// Parses a comma separated list such as `10000000uluna,5uusd`.
impl FromStr for Coins {
	type Err = CoinParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.trim().is_empty() {
			return Ok(Coins::default());
		}
		s.split(',')
			.map(Coin::from_str)
			.collect::<Result<Vec<_>, _>>()
			.map(Coins)
	}
}

impl fmt::Display for Coins {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
		write!(f, "{}", parts.join(","))
	}
}

fn serialize_amount<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&amount.to_string())
}

fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
	let raw = String::deserialize(deserializer)?;
	raw.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_coin() {
		let coin: Coin = "500000uluna".parse().unwrap();
		assert_eq!(coin, Coin::new(500_000, "uluna"));
		assert_eq!(coin.to_string(), "500000uluna");
	}

	#[test]
	fn test_parse_coin_errors() {
		assert!(matches!(
			"uluna".parse::<Coin>(),
			Err(CoinParseError::MissingAmount(_))
		));
		assert!(matches!(
			"1000".parse::<Coin>(),
			Err(CoinParseError::MissingDenom(_))
		));
	}

	#[test]
	fn test_parse_coin_list() {
		let coins: Coins = "10000000uluna, 5uusd".parse().unwrap();
		assert_eq!(coins.0.len(), 2);
		assert_eq!(coins.amount_of("uluna"), 10_000_000);
		assert_eq!(coins.amount_of("uusd"), 5);
		assert!("".parse::<Coins>().unwrap().is_empty());
	}

	#[test]
	fn test_amount_is_a_string_on_the_wire() {
		let json = serde_json::to_value(Coin::new(100_000, "uluna")).unwrap();
		assert_eq!(
			json,
			serde_json::json!({ "denom": "uluna", "amount": "100000" })
		);

		let back: Coin = serde_json::from_value(json).unwrap();
		assert_eq!(back.amount, 100_000);
	}
}
