//! Purpose: Typed record layer over row-oriented tabular stores.
//! Exports: `core` (values, records, codec, versioning, stores, tables, diff, migration).
//! Role: Library crate; backing stores plug in through `core::store::TabularStore`.
//! Invariants: Record operations are synchronous and re-read the store on every call.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
