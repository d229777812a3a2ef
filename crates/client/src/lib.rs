//! sealtalk-client: the client side of SealTalk's end-to-end encryption.
//!
//! Talks to the key directory over HTTP, owns the local key store, and
//! runs the send path (encrypt to every room member) and receive path
//! (decrypt pipeline) for a signed-in user.

pub mod chat;
pub mod config;
pub mod directory;
pub mod error;
