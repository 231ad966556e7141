use crate::error::{CallError, Result};
use crate::peer::codec;
use crate::peer::types::SignalKind;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Входящие события relay: по одному типу на вид сообщения
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Offer(String),
    Answer(String),
    IceCandidate(String),
}

impl RelayEvent {
    pub fn blob(&self) -> &str {
        match self {
            RelayEvent::Offer(blob) | RelayEvent::Answer(blob) | RelayEvent::IceCandidate(blob) => {
                blob
            }
        }
    }

    pub fn expected_kind(&self) -> SignalKind {
        match self {
            RelayEvent::Offer(_) => SignalKind::Offer,
            RelayEvent::Answer(_) => SignalKind::Answer,
            RelayEvent::IceCandidate(_) => SignalKind::Candidate,
        }
    }
}

/// Исходящая сторона relay: единственное событие `signal`
#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn signal(&self, blob: String) -> Result<()>;
}

/// Разбирает `signal` по полю `type` внутри полезной нагрузки
pub fn route_signal(blob: String) -> Result<RelayEvent> {
    let kind = codec::decode(&blob)?.kind();
    Ok(match kind {
        SignalKind::Offer => RelayEvent::Offer(blob),
        SignalKind::Answer => RelayEvent::Answer(blob),
        SignalKind::Candidate => RelayEvent::IceCandidate(blob),
    })
}

/// Relay внутри процесса: `signal` одной стороны приходит другой как `RelayEvent`
#[derive(Clone)]
pub struct LoopbackRelay {
    deliver: Arc<dyn Fn(RelayEvent) -> bool + Send + Sync>,
}

impl LoopbackRelay {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RelayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::forward(tx, |event| event), rx)
    }

    pub fn forward<E: Send + 'static>(
        tx: mpsc::UnboundedSender<E>,
        wrap: fn(RelayEvent) -> E,
    ) -> Self {
        LoopbackRelay {
            deliver: Arc::new(move |event| tx.send(wrap(event)).is_ok()),
        }
    }
}

impl fmt::Debug for LoopbackRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoopbackRelay")
    }
}

#[async_trait]
impl RelayChannel for LoopbackRelay {
    async fn signal(&self, blob: String) -> Result<()> {
        let event = route_signal(blob)?;
        debug!("loopback relay: {:?}", event.expected_kind());
        if (self.deliver)(event) {
            Ok(())
        } else {
            Err(CallError::RelayClosed)
        }
    }
}
