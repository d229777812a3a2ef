//! SealTalk shared library: IDs, errors, and wire contracts shared between server and client.

pub mod api;
pub mod constants;
pub mod error;
pub mod ids;
