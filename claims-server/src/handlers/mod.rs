pub mod claims;
pub mod dashboard;
pub mod health;
pub mod mutations;
