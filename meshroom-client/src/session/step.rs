use crate::error::MediaError;
use crate::media::{DisplayStream, LocalStream};
use crate::transport::PeerConnection;
use anyhow::{Context, Result};
use meshroom_core::{ConnectionId, PeerId, SessionDescription};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// An awaiting operation on a connection, run off the session task.
#[derive(Debug)]
pub(crate) enum NegotiationStep {
    CreateOffer,
    ApplyLocalOffer(SessionDescription),
    ApplyRemoteOffer(SessionDescription),
    /// Create the answer and apply it locally.
    CreateAnswer,
    ApplyRemoteAnswer(SessionDescription),
}

#[derive(Debug)]
pub(crate) enum StepOutcome {
    OfferCreated(SessionDescription),
    LocalOfferApplied(SessionDescription),
    RemoteOfferApplied,
    AnswerApplied(SessionDescription),
    RemoteAnswerApplied,
}

impl NegotiationStep {
    async fn run(self, connection: &dyn PeerConnection) -> Result<StepOutcome> {
        match self {
            Self::CreateOffer => connection
                .create_offer()
                .await
                .map(StepOutcome::OfferCreated),
            Self::ApplyLocalOffer(offer) => {
                connection
                    .set_local_description(offer.clone())
                    .await
                    .context("applying local offer")?;
                Ok(StepOutcome::LocalOfferApplied(offer))
            }
            Self::ApplyRemoteOffer(offer) => {
                connection
                    .set_remote_description(offer)
                    .await
                    .context("applying remote offer")?;
                Ok(StepOutcome::RemoteOfferApplied)
            }
            Self::CreateAnswer => {
                let answer = connection.create_answer().await?;
                connection
                    .set_local_description(answer.clone())
                    .await
                    .context("applying local answer")?;
                Ok(StepOutcome::AnswerApplied(answer))
            }
            Self::ApplyRemoteAnswer(answer) => {
                connection
                    .set_remote_description(answer)
                    .await
                    .context("applying remote answer")?;
                Ok(StepOutcome::RemoteAnswerApplied)
            }
        }
    }

    /// Runs the step on its own task and posts the result back tagged with
    /// the connection it ran against.
    pub(crate) fn spawn(
        self,
        peer: PeerId,
        connection: Arc<dyn PeerConnection>,
        continuations: mpsc::Sender<Continuation>,
    ) {
        tokio::spawn(async move {
            let id = connection.id();
            let result = self.run(connection.as_ref()).await;
            let _ = continuations
                .send(Continuation::Negotiation {
                    peer,
                    connection: id,
                    result,
                })
                .await;
        });
    }
}

/// Results re-entering the session queue from spawned work and timers.
pub(crate) enum Continuation {
    Negotiation {
        peer: PeerId,
        connection: ConnectionId,
        result: Result<StepOutcome>,
    },
    AnswerTimeout {
        peer: PeerId,
        connection: ConnectionId,
    },
    CooldownElapsed {
        generation: u64,
    },
    MediaAcquired(Result<LocalStream, MediaError>),
    DisplayAcquired {
        result: Result<DisplayStream, MediaError>,
        reply: oneshot::Sender<bool>,
    },
    ScreenShareEnded {
        stream_id: String,
    },
}
