pub mod poseidon;
pub mod salt;
