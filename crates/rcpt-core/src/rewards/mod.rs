//! Loyalty point ledger.

mod ledger;

pub use ledger::RewardLedger;
