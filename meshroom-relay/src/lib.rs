mod config;
mod error;
mod router;
mod signaling;

pub use config::*;
pub use error::*;
pub use router::*;
pub use signaling::*;
