//! Transaction coordinator
//!
//! Packages a batch of operations into an all-or-nothing unit against
//! the durable store and the index set.
//!
//! Commit ordering: the durable store first, then the secondary indexes,
//! the primary index last. Rollback compensates in reverse: primary
//! first, then secondaries, then the store. After a rollback every index
//! contains exactly what it contained at begin.
//!
//! Two atomicity modes: *atomic* (default) applies every index and
//! compensates on any failure; *best-effort* applies the store and the
//! primary index only, accepting eventual reindexing.

mod coordinator;
mod errors;
mod rollback;

pub use coordinator::{
    AtomicityMode, OpResult, Transaction, TransactionCoordinator, TxnOutcome, TxnState, TxOp,
};
pub use errors::TxnError;
pub use rollback::{RollbackManager, RollbackOutcome};
