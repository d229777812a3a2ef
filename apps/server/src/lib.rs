pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod router;
pub mod shutdown;
pub mod state;
pub mod validation;
