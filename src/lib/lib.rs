pub mod adapters;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod issuer;
pub mod ports;
pub mod vault;
