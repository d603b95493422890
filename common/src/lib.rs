//! PairLedger Common Types
//!
//! Shared types for the PairLedger workspace: account identifiers, the exact
//! decimal money type, account rows, transfer requests and the closed error
//! taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod account;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use account::*;
pub use error::*;
