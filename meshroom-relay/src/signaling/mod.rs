mod online_registry;
mod signaling_service;
mod ws_handler;

pub use online_registry::*;
pub use signaling_service::*;
pub use ws_handler::*;
