//! Domain model: sessions, settlement attempt records, wallet value types,
//! outcome events and the ports the engine depends on.

pub mod events;
pub mod ports;
pub mod session;
pub mod transaction;
pub mod wallet;
