//! Link management: address query, connect/disconnect, payload transfer

pub mod manager;

pub use manager::{classify_connect_reply, BleLink, ConnectOutcome};
