use crate::config::Config;
use crate::error::{CallError, Result};
use crate::logger::dump_signal;
use crate::peer::state::{Phase, Session};
use crate::peer::transport::{TransportEvent, TransportEvents, TransportSessionFacade};
use crate::peer::types::{
    CallId, CallState, Envelope, MediaHandle, Role, ServerConfig, SessionId, Signal, SignalKind,
};
use tracing::{debug, info, warn};

/// Что изменилось после события транспорта
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Connected(MediaHandle),
    RemoteMediaUpdated(MediaHandle),
}

/// Машина состояний одного звонка: Idle → Negotiating → Connected → Idle.
///
/// Все методы вызываются из одного цикла событий, поэтому переходы
/// никогда не пересекаются.
pub struct SessionNegotiator<T> {
    transport: T,
    events: TransportEvents,
    ice_servers: Vec<ServerConfig>,
    trickle: bool,
    session: Option<Session>,
    next_session: u64,
}

impl<T: TransportSessionFacade> SessionNegotiator<T> {
    pub fn new(transport: T, config: &Config, events: TransportEvents) -> Self {
        SessionNegotiator {
            transport,
            events,
            ice_servers: config.ice_servers.clone(),
            trickle: config.trickle,
            session: None,
            next_session: 0,
        }
    }

    pub fn state(&self) -> CallState {
        self.session
            .as_ref()
            .map_or(CallState::Idle, Session::state)
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.session.as_ref().and_then(|s| s.call_id.as_ref())
    }

    pub fn remote_media(&self) -> Option<&MediaHandle> {
        self.session.as_ref().and_then(Session::remote_media)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Забирает накопленные исходящие сообщения
    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        self.session
            .as_mut()
            .map(Session::take_outbound)
            .unwrap_or_default()
    }

    /// Исходящий звонок
    pub async fn start_call(&mut self, local_media: Option<&MediaHandle>) -> Result<SessionId> {
        if let Some(session) = &self.session {
            return Err(CallError::InvalidTransition {
                message: "start call",
                state: session.state(),
            });
        }
        let local_media = local_media.ok_or_else(|| {
            CallError::MediaUnavailable("no local capture handle".to_string())
        })?;

        let session = Session::new(self.allocate(), Role::Initiator, Some(CallId::generate()));
        self.open(session, Some(local_media), None).await
    }

    /// Входящий offer при отсутствии сессии создаёт сессию ответчика
    pub async fn receive_offer(
        &mut self,
        offer: Envelope,
        local_media: Option<&MediaHandle>,
    ) -> Result<SessionId> {
        dump_signal("inbound", &offer);
        if let Some(session) = &self.session {
            return Err(CallError::InvalidTransition {
                message: "offer",
                state: session.state(),
            });
        }
        if offer.kind() != SignalKind::Offer {
            return Err(CallError::MalformedBlob(format!(
                "expected offer, got {:?}",
                offer.kind()
            )));
        }

        let session = Session::new(self.allocate(), Role::Responder, offer.call_id);
        self.open(session, local_media, Some(offer.signal)).await
    }

    pub async fn receive_answer(&mut self, answer: Envelope) -> Result<()> {
        dump_signal("inbound", &answer);
        let id = {
            let session = self.current_for("answer", &answer)?;
            if session.role != Role::Initiator
                || session.state() != CallState::Negotiating
                || session.remote_description_applied()
            {
                return Err(CallError::InvalidTransition {
                    message: "answer",
                    state: session.state(),
                });
            }
            session.id
        };
        if answer.kind() != SignalKind::Answer {
            return Err(CallError::MalformedBlob(format!(
                "expected answer, got {:?}",
                answer.kind()
            )));
        }

        if let Err(err) = self.transport.supply_remote_blob(id, answer.signal).await {
            self.teardown().await;
            return Err(err);
        }
        if let Some(session) = self.session.as_mut() {
            session.mark_remote_description_applied();
        }
        Ok(())
    }

    pub async fn receive_ice_candidate(&mut self, candidate: Envelope) -> Result<()> {
        dump_signal("inbound", &candidate);
        let id = self.current_for("ice candidate", &candidate)?.id;
        if candidate.kind() != SignalKind::Candidate {
            return Err(CallError::MalformedBlob(format!(
                "expected candidate, got {:?}",
                candidate.kind()
            )));
        }

        if let Err(err) = self.transport.supply_remote_blob(id, candidate.signal).await {
            self.teardown().await;
            return Err(err);
        }
        Ok(())
    }

    /// Применяет событие транспорта; события чужих сессий игнорируются
    pub async fn handle_transport_event(
        &mut self,
        event: TransportEvent,
    ) -> Result<Option<Transition>> {
        let trickle = self.trickle;
        let session = match self.session.as_mut() {
            Some(session) if session.id == event.session() => session,
            _ => {
                debug!("dropping stale transport event for {}", event.session());
                return Ok(None);
            }
        };

        match event {
            TransportEvent::LocalBlob { blob, .. } => {
                session.queue_local(blob, trickle);
                Ok(None)
            }
            TransportEvent::GatheringComplete { .. } => {
                debug!("{}: local candidate gathering complete", session.id);
                session.complete_gathering(trickle);
                Ok(None)
            }
            TransportEvent::StreamReady { media, .. } => {
                Ok(Some(Self::on_remote_stream_ready(session, media)))
            }
            TransportEvent::Failed { reason, .. } => {
                warn!("{}: transport failed: {}", session.id, reason);
                self.teardown().await;
                Err(CallError::TransportFailure(reason))
            }
        }
    }

    /// Единственный переход в `Connected`
    fn on_remote_stream_ready(session: &mut Session, media: MediaHandle) -> Transition {
        if let Phase::Connected(remote) = &mut session.phase {
            remote.merge(media);
            return Transition::RemoteMediaUpdated(remote.clone());
        }

        info!("{}: remote stream {} ready", session.id, media.stream_id);
        session.phase = Phase::Connected(media.clone());
        Transition::Connected(media)
    }

    /// Завершает звонок. `false` если звонка не было
    pub async fn end_call(&mut self) -> bool {
        if self.session.is_none() {
            return false;
        }
        self.teardown().await;
        true
    }

    fn allocate(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    fn current_for(&self, message: &'static str, envelope: &Envelope) -> Result<&Session> {
        match &self.session {
            None => Err(CallError::InvalidTransition {
                message,
                state: CallState::Idle,
            }),
            Some(session) if !session.addresses(envelope.call_id.as_ref()) => {
                Err(CallError::InvalidTransition {
                    message,
                    state: session.state(),
                })
            }
            Some(session) => Ok(session),
        }
    }

    async fn open(
        &mut self,
        session: Session,
        local_media: Option<&MediaHandle>,
        remote_offer: Option<Signal>,
    ) -> Result<SessionId> {
        let id = session.id;
        let role = session.role;
        info!("{}: opening as {:?}", id, role);

        self.transport
            .create_session(id, role, local_media, &self.ice_servers, self.events.clone())
            .await?;
        self.session = Some(session);

        if let Err(err) = self.negotiate(id, remote_offer).await {
            self.teardown().await;
            return Err(err);
        }
        Ok(id)
    }

    async fn negotiate(&mut self, id: SessionId, remote_offer: Option<Signal>) -> Result<()> {
        if let Some(offer) = remote_offer {
            self.transport.supply_remote_blob(id, offer).await?;
            if let Some(session) = self.session.as_mut() {
                session.mark_remote_description_applied();
            }
        }
        self.transport.produce_local_blob(id).await
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            info!("{}: tearing down ({:?})", session.id, session.state());
            self.transport.destroy(session.id).await;
        }
    }
}
