pub mod amount;
pub mod commitment;
pub mod credential;
pub(crate) mod decimal;
pub mod error;
pub mod inputs;
pub mod nullifier;
pub mod proof;
pub mod record;
pub mod yield_rule;

pub use error::ValidationError;
