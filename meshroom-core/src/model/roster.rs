use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

/// One entry of the roster broadcast on a room's participants topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineParticipant {
    pub user_id: PeerId,
}
