pub mod balances;
pub mod corrections;
pub mod ledger;
pub mod movements;
pub mod sequences;
pub mod txn;

pub use balances::BalanceStore;
pub use corrections::CorrectionService;
pub use ledger::LedgerWriter;
pub use movements::MovementService;
pub use sequences::SequenceService;
pub use txn::{RetryConfig, TxnRunner};
