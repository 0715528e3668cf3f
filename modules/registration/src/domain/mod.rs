pub mod baseline;
pub mod error;
pub mod identity;
pub mod manager;
pub mod outcome;
pub mod payload;
