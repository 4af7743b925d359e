pub mod client;
pub mod crypto;
mod error;
pub mod link;
pub mod orchestrator;
pub mod record;

pub use {
    error::{Error, Result},
    keepsake_protocol as protocol,
};
