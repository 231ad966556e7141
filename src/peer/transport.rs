use crate::error::Result;
use crate::peer::types::{IceCandidate, MediaHandle, Role, ServerConfig, SessionId, Signal};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Blob, созданный транспортом. Offer это или Answer, решает негоциатор по роли
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalBlob {
    Description(String),
    Candidate(IceCandidate),
}

/// Асинхронные результаты транспорта, помеченные сессией-источником
#[derive(Debug, Clone)]
pub enum TransportEvent {
    LocalBlob { session: SessionId, blob: LocalBlob },
    GatheringComplete { session: SessionId },
    StreamReady { session: SessionId, media: MediaHandle },
    Failed { session: SessionId, reason: String },
}

impl TransportEvent {
    pub fn session(&self) -> SessionId {
        match self {
            TransportEvent::LocalBlob { session, .. }
            | TransportEvent::GatheringComplete { session }
            | TransportEvent::StreamReady { session, .. }
            | TransportEvent::Failed { session, .. } => *session,
        }
    }
}

/// Куда транспорт складывает свои события
#[derive(Clone)]
pub struct TransportEvents {
    emit: Arc<dyn Fn(TransportEvent) -> bool + Send + Sync>,
}

impl TransportEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::forward(tx, |event| event), rx)
    }

    /// Пересылает события в чужую очередь, оборачивая их через `wrap`
    pub fn forward<E: Send + 'static>(
        tx: mpsc::UnboundedSender<E>,
        wrap: fn(TransportEvent) -> E,
    ) -> Self {
        TransportEvents {
            emit: Arc::new(move |event| tx.send(wrap(event)).is_ok()),
        }
    }

    /// `false` если получатель уже закрыт
    pub fn emit(&self, event: TransportEvent) -> bool {
        (self.emit)(event)
    }
}

impl fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportEvents")
    }
}

/// Установка прямого соединения (ICE/SDP).
///
/// Результаты `produce_local_blob` и готовность удалённого потока приходят
/// через [`TransportEvents`], переданный в `create_session`.
#[async_trait]
pub trait TransportSessionFacade: Send {
    async fn create_session(
        &mut self,
        session: SessionId,
        role: Role,
        local_media: Option<&MediaHandle>,
        ice_servers: &[ServerConfig],
        events: TransportEvents,
    ) -> Result<()>;

    async fn supply_remote_blob(&mut self, session: SessionId, signal: Signal) -> Result<()>;

    async fn produce_local_blob(&mut self, session: SessionId) -> Result<()>;

    async fn destroy(&mut self, session: SessionId);
}
