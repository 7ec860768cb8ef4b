//! Storage layer.
//!
//! The content store is the authoritative owner of durable state: per
//! identity, an artifact pair per record plus one content hash ledger. The
//! in-memory registry cache is derived from it and rebuildable at any time.

pub mod content_store;
pub mod ledger;

pub use content_store::ContentStore;
pub use ledger::HashLedger;
