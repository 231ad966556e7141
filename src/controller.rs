use crate::config::Config;
use crate::error::{CallError, Result};
use crate::logger::dump_signal;
use crate::peer::codec;
use crate::peer::negotiator::{SessionNegotiator, Transition};
use crate::peer::transport::{TransportEvent, TransportEvents, TransportSessionFacade};
use crate::peer::types::{CallState, MediaHandle, Role};
use crate::signaling::{RelayChannel, RelayEvent};
use once_cell::sync::OnceCell;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

const NOTIFY_CAPACITY: usize = 64;

/// Действия пользователя
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartCall,
    EndCall,
}

/// Единый тип входящих событий цикла
#[derive(Debug)]
pub enum Event {
    User(Command),
    Relay(RelayEvent),
    Transport(TransportEvent),
    /// Результат однократного захвата камеры/микрофона при старте
    LocalMedia(std::result::Result<MediaHandle, String>),
    Shutdown,
}

/// Уведомления для слоя представления
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    LocalMediaAvailable(MediaHandle),
    RemoteMediaAvailable(MediaHandle),
    CallConnected,
    CallEnded,
    Error(String),
}

/// Снимок состояния для UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStateView {
    pub in_call: bool,
    pub state: CallState,
    pub role: Option<Role>,
    pub local_media: Option<MediaHandle>,
    pub remote_media: Option<MediaHandle>,
    pub last_error: Option<String>,
}

/// Верхний уровень: не более одного звонка, relay внедряется снаружи
pub struct CallController<T, R> {
    negotiator: SessionNegotiator<T>,
    relay: R,
    /// Захватывается один раз и живёт до завершения процесса
    local_media: OnceCell<MediaHandle>,
    notify: broadcast::Sender<CallEvent>,
    last_error: Option<String>,
}

impl<T, R> CallController<T, R>
where
    T: TransportSessionFacade,
    R: RelayChannel,
{
    /// `inbox` — отправитель очереди, которую потом читает [`CallController::run`].
    /// События транспорта попадают в ту же очередь.
    pub fn new(transport: T, relay: R, config: &Config, inbox: mpsc::UnboundedSender<Event>) -> Self {
        info!(
            "call controller using relay {} (trickle={})",
            config.signaling_server, config.trickle
        );
        let events = TransportEvents::forward(inbox, Event::Transport);
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);

        CallController {
            negotiator: SessionNegotiator::new(transport, config, events),
            relay,
            local_media: OnceCell::new(),
            notify,
            last_error: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.notify.subscribe()
    }

    pub fn negotiator(&self) -> &SessionNegotiator<T> {
        &self.negotiator
    }

    pub fn call_state(&self) -> CallStateView {
        let state = self.negotiator.state();
        CallStateView {
            in_call: state != CallState::Idle,
            state,
            role: self.negotiator.role(),
            local_media: self.local_media.get().cloned(),
            remote_media: self.negotiator.remote_media().cloned(),
            last_error: self.last_error.clone(),
        }
    }

    /// Однократная установка локального потока; повторные вызовы игнорируются
    pub fn provide_local_media(&mut self, media: std::result::Result<MediaHandle, String>) {
        match media {
            Ok(handle) => {
                if self.local_media.set(handle.clone()).is_err() {
                    warn!("local media already acquired, ignoring {}", handle.stream_id);
                    return;
                }
                info!("local media {} acquired", handle.stream_id);
                self.emit(CallEvent::LocalMediaAvailable(handle));
            }
            Err(reason) => {
                let _ = self.report(CallError::MediaUnavailable(reason), false);
            }
        }
    }

    pub async fn start_call(&mut self) -> Result<()> {
        let result = self.negotiator.start_call(self.local_media.get()).await;
        match result {
            Ok(session) => {
                self.last_error = None;
                info!("{}: outgoing call started", session);
                self.flush().await
            }
            Err(err) => self.report(err, false),
        }
    }

    pub async fn end_call(&mut self) {
        if self.negotiator.end_call().await {
            info!("call ended by user");
            self.emit(CallEvent::CallEnded);
        } else {
            debug!("end call ignored, no active session");
        }
    }

    pub async fn handle_inbound(&mut self, message: RelayEvent) -> Result<()> {
        let was_active = self.in_call();
        let envelope = match codec::decode(message.blob()) {
            Ok(envelope) if envelope.kind() == message.expected_kind() => envelope,
            Ok(envelope) => {
                let err = CallError::MalformedBlob(format!(
                    "{:?} payload delivered as {:?}",
                    envelope.kind(),
                    message.expected_kind()
                ));
                return self.report(err, was_active);
            }
            Err(err) => return self.report(err, was_active),
        };

        let result = match message {
            RelayEvent::Offer(_) => self
                .negotiator
                .receive_offer(envelope, self.local_media.get())
                .await
                .map(|session| info!("{}: incoming call", session)),
            RelayEvent::Answer(_) => self.negotiator.receive_answer(envelope).await,
            RelayEvent::IceCandidate(_) => self.negotiator.receive_ice_candidate(envelope).await,
        };

        match result {
            Ok(()) => self.flush().await,
            Err(err) => self.report(err, was_active),
        }
    }

    pub async fn handle_transport(&mut self, event: TransportEvent) -> Result<()> {
        let was_active = self.in_call();
        match self.negotiator.handle_transport_event(event).await {
            Ok(Some(Transition::Connected(remote))) => {
                self.emit(CallEvent::RemoteMediaAvailable(remote));
                self.emit(CallEvent::CallConnected);
                self.flush().await
            }
            Ok(Some(Transition::RemoteMediaUpdated(remote))) => {
                self.emit(CallEvent::RemoteMediaAvailable(remote));
                self.flush().await
            }
            Ok(None) => self.flush().await,
            Err(err) => self.report(err, was_active),
        }
    }

    /// Применяет одно событие. Ошибки уже сообщены в UI, цикл продолжается.
    /// Возвращает `false` на `Shutdown`.
    pub async fn dispatch(&mut self, event: Event) -> bool {
        let outcome = match event {
            Event::User(Command::StartCall) => self.start_call().await,
            Event::User(Command::EndCall) => {
                self.end_call().await;
                Ok(())
            }
            Event::Relay(message) => self.handle_inbound(message).await,
            Event::Transport(event) => self.handle_transport(event).await,
            Event::LocalMedia(media) => {
                self.provide_local_media(media);
                Ok(())
            }
            Event::Shutdown => {
                self.end_call().await;
                return false;
            }
        };
        if let Err(err) = outcome {
            debug!("event handled with error: {}", err);
        }
        true
    }

    /// Цикл событий: строго по одному, в порядке поступления.
    ///
    /// Транспорт держит свой клон отправителя очереди, поэтому очередь
    /// не закрывается сама: остановить цикл можно только `Event::Shutdown`.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = inbox.recv().await {
            if !self.dispatch(event).await {
                break;
            }
        }
        self.end_call().await;
        info!("call controller stopped");
    }

    fn in_call(&self) -> bool {
        self.negotiator.state() != CallState::Idle
    }

    /// Отправляет всё, что накопил негоциатор
    async fn flush(&mut self) -> Result<()> {
        for envelope in self.negotiator.take_outbound() {
            dump_signal("outbound", &envelope);
            let sent = match codec::encode(&envelope) {
                Ok(blob) => self.relay.signal(blob).await,
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                self.negotiator.end_call().await;
                // звонок уже сброшен: ошибка отправки не может быть «шумом»
                let err = if err.is_discardable() {
                    CallError::TransportFailure(format!("signal not sent: {}", err))
                } else {
                    err
                };
                return self.report(err, true);
            }
        }
        Ok(())
    }

    /// Шумовые ошибки логируются; остальные уходят в UI, звонок уже сброшен
    fn report(&mut self, err: CallError, was_active: bool) -> Result<()> {
        if err.is_discardable() {
            warn!("discarding message: {}", err);
            return Err(err);
        }

        error!("call error: {}", err);
        self.last_error = Some(err.to_string());
        self.emit(CallEvent::Error(err.to_string()));
        if was_active && !self.in_call() {
            self.emit(CallEvent::CallEnded);
        }
        Err(err)
    }

    fn emit(&self, event: CallEvent) {
        // нет подписчиков — не ошибка
        let _ = self.notify.send(event);
    }
}
