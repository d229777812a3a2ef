pub mod health;
pub mod keys;
pub mod presence;
