mod link_table;
mod mesh_session;
mod negotiation;
mod reconciler;
mod session;
mod session_command;
mod step;
mod view;

pub use link_table::{CandidateQueues, NegotiationState, PeerLink, PeerLinkTable};
pub use mesh_session::MeshSession;
pub use reconciler::{Cooldown, Reconciler};
pub use session::SessionDeps;
pub use session_command::SessionCommand;
pub use view::{LinkStatus, SessionEvent, SessionView};
