//! Key-custody client.

pub mod client;

pub use self::client::{DEFAULT_RPC_TIMEOUT, KeyCustodyClient};
