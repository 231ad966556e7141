pub mod config;
pub mod controller;
pub mod error;
pub mod logger;
pub mod peer;
pub mod signaling;
pub mod utils;

pub use config::Config;
pub use controller::{CallController, CallEvent, CallStateView, Command, Event};
pub use error::{CallError, ConfigError, Result};
pub use peer::{
    CallState, Envelope, MediaHandle, Role, SessionId, SessionNegotiator, Signal, TransportEvent,
    TransportEvents, TransportSessionFacade, WebRtcTransport,
};
pub use signaling::{LoopbackRelay, RelayChannel, RelayEvent};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Запускает контроллер поверх WebRTC в фоновой задаче.
///
/// Возвращает отправитель очереди событий: в него кладутся команды
/// пользователя, входящие сообщения relay и результат захвата медиа.
pub fn run<R>(relay: R, config: Config) -> (mpsc::UnboundedSender<Event>, JoinHandle<()>)
where
    R: RelayChannel + 'static,
{
    logger::init();

    let (inbox, rx) = mpsc::unbounded_channel();
    let controller = CallController::new(WebRtcTransport::new(), relay, &config, inbox.clone());
    let handle = tokio::spawn(controller.run(rx));
    (inbox, handle)
}
