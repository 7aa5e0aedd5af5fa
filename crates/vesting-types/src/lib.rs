//! Shared types for the vesting operations tooling.

pub mod coin;
pub mod messages;
pub mod outcome;
pub mod serde_helpers;
pub mod transaction;

pub use coin::*;
pub use messages::*;
pub use outcome::*;
pub use transaction::*;
