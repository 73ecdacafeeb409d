//! Adapters for the engine's ports: in-memory stores, a deterministic
//! in-process ledger, and persistent RocksDB storage behind the
//! `storage-rocksdb` feature.

pub mod in_memory;
pub mod ledger;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
