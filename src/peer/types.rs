use crate::utils::random_id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Роль участника; фиксируется при создании сессии
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Initiator,
    Responder,
}

/// Состояние звонка. `Idle` означает, что сессии нет
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Idle,
    Negotiating,
    Connected,
}

/// Локальный идентификатор сессии; по нему отсекаются устаревшие колбэки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Идентификатор звонка, который передаётся по сети
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn generate() -> Self {
        CallId(random_id())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: MediaKind,
}

/// Медиапоток (локальный захват или удалённый)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub stream_id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaHandle {
    /// Поток камеры и микрофона с дорожками `audio` и `video`
    pub fn camera(stream_id: impl Into<String>) -> Self {
        MediaHandle {
            stream_id: stream_id.into(),
            tracks: vec![
                MediaTrack {
                    id: "audio".into(),
                    kind: MediaKind::Audio,
                },
                MediaTrack {
                    id: "video".into(),
                    kind: MediaKind::Video,
                },
            ],
        }
    }

    /// Добавляет дорожки, которых ещё нет в потоке
    pub fn merge(&mut self, other: MediaHandle) {
        for track in other.tracks {
            if !self.tracks.iter().any(|t| t.id == track.id) {
                self.tracks.push(track);
            }
        }
    }
}

/// ICE кандидат в формате браузерного `RTCIceCandidateInit`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

/// Единица согласования, различаемая по полю `type`.
///
/// `candidates` заполнен только в режиме без trickle: описание и все
/// кандидаты уходят одним сообщением.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    Offer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        candidates: Vec<IceCandidate>,
    },
    Answer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        candidates: Vec<IceCandidate>,
    },
    Candidate {
        candidate: IceCandidate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Offer { .. } => SignalKind::Offer,
            Signal::Answer { .. } => SignalKind::Answer,
            Signal::Candidate { .. } => SignalKind::Candidate,
        }
    }
}

/// Полезная нагрузка события `signal` с идентификатором звонка
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    #[serde(rename = "callId", default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    #[serde(flatten)]
    pub signal: Signal,
}

impl Envelope {
    pub fn kind(&self) -> SignalKind {
        self.signal.kind()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Stun,
    Turn,
}

/// Конфигурация ICE сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl ServerConfig {
    pub fn stun(id: impl Into<String>, url: impl Into<String>) -> Self {
        ServerConfig {
            id: id.into(),
            kind: ServerKind::Stun,
            url: url.into(),
            username: None,
            credential: None,
        }
    }
}
