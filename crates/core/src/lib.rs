pub mod transaction;

pub use transaction::{Field, Transaction, TransactionSource, TransactionType};
