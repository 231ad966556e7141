use crate::peer::types::CallState;
use thiserror::Error;

/// Ошибки согласования звонка
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Камера/микрофон недоступны; звонок не начнётся, можно повторить
    #[error("local media unavailable: {0}")]
    MediaUnavailable(String),

    /// Сообщение пришло не в том состоянии и отброшено
    #[error("{message} discarded in state {state:?}")]
    InvalidTransition {
        message: &'static str,
        state: CallState,
    },

    #[error("malformed negotiation blob: {0}")]
    MalformedBlob(String),

    /// Прямое соединение не установилось или оборвалось; звонок завершается
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("relay channel closed")]
    RelayClosed,
}

impl CallError {
    /// `true` если ошибку достаточно залогировать, не сбрасывая звонок
    pub fn is_discardable(&self) -> bool {
        matches!(
            self,
            CallError::InvalidTransition { .. } | CallError::MalformedBlob(_)
        )
    }
}

impl From<serde_json::Error> for CallError {
    fn from(e: serde_json::Error) -> Self {
        CallError::MalformedBlob(e.to_string())
    }
}

impl From<webrtc::Error> for CallError {
    fn from(e: webrtc::Error) -> Self {
        CallError::TransportFailure(e.to_string())
    }
}

/// Ошибки конфигурации
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ICE server `{0}`: URL cannot be empty")]
    EmptyUrl(String),

    #[error("TURN server `{0}` requires username and credential")]
    MissingCredentials(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

pub type Result<T, E = CallError> = std::result::Result<T, E>;
