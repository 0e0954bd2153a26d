// Core modules implementing the record codec, stores, table engine, and error modeling.
pub mod codec;
pub mod diff;
pub mod error;
pub mod file;
pub mod migrate;
pub mod record;
pub mod store;
pub mod table;
pub mod value;
pub mod version;
