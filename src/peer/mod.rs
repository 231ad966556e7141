pub mod codec;
pub mod connection;
pub mod ice;
pub mod negotiator;
pub mod state;
pub mod transport;
pub mod types;

pub use connection::WebRtcTransport;
pub use negotiator::{SessionNegotiator, Transition};
pub use state::GRACE_PERIOD;
pub use transport::{LocalBlob, TransportEvent, TransportEvents, TransportSessionFacade};
pub use types::{
    CallId, CallState, Envelope, IceCandidate, MediaHandle, MediaKind, MediaTrack, Role,
    ServerConfig, ServerKind, SessionId, Signal, SignalKind,
};
