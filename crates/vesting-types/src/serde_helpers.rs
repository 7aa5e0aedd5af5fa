//! Serde helpers for the node's JSON encoding, where 64-bit integers are
//! rendered as strings.

pub mod u64_string {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&value.to_string())
	}

	/// Accepts both `"42"` and `42`.
	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Str(String),
			Num(u64),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Str(s) if s.is_empty() => Ok(0),
			Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
			Raw::Num(n) => Ok(n),
		}
	}
}
