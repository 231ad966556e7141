// Конфигурация приложения
// Логирование можно отключить только в режиме разработки

use crate::error::ConfigError;
use crate::peer::types::{ServerConfig, ServerKind};

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false;

#[cfg(debug_assertions)]
pub mod dev {
    // Для полного отключения логирования в режиме разработки
    // измените эту константу на false
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
}

pub const SIGNALING_SERVER_ENV: &str = "SIGNALING_SERVER";
pub const ICE_SERVERS_ENV: &str = "ICE_SERVERS";
pub const TRICKLE_ENV: &str = "TRICKLE";

pub const DEFAULT_SIGNALING_SERVER: &str = "https://your-signaling-server.com";

/// Настройки звонка
#[derive(Debug, Clone)]
pub struct Config {
    /// Адрес сигнального сервера (relay)
    pub signaling_server: String,
    pub ice_servers: Vec<ServerConfig>,
    /// `false`: все кандидаты собираются и уходят одним сообщением
    pub trickle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            signaling_server: DEFAULT_SIGNALING_SERVER.to_string(),
            ice_servers: default_ice_servers(),
            trickle: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Собирает конфигурацию из произвольного источника переменных
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(server) = lookup(SIGNALING_SERVER_ENV).filter(|s| !s.trim().is_empty()) {
            config.signaling_server = server.trim().to_string();
        }

        // Внешние (обычно TURN) серверы добавляются к STUN по умолчанию
        if let Some(raw) = lookup(ICE_SERVERS_ENV).filter(|s| !s.trim().is_empty()) {
            let extra: Vec<ServerConfig> =
                serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                    key: ICE_SERVERS_ENV,
                    reason: e.to_string(),
                })?;
            validate_servers(&extra)?;
            config.ice_servers.extend(extra);
        }

        if let Some(raw) = lookup(TRICKLE_ENV) {
            config.trickle = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: TRICKLE_ENV,
                        reason: format!("expected true/false, got `{}`", other),
                    })
                }
            };
        }

        Ok(config)
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig::stun("default-stun", "stun:stun.l.google.com:19302"),
        ServerConfig::stun("default-stun-1", "stun:stun1.l.google.com:19302"),
    ]
}

/// Проверяет список ICE серверов
pub fn validate_servers(servers: &[ServerConfig]) -> Result<(), ConfigError> {
    for server in servers {
        if server.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl(server.id.clone()));
        }

        if server.kind == ServerKind::Turn
            && (server.username.is_none() || server.credential.is_none())
        {
            return Err(ConfigError::MissingCredentials(server.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_batch_candidates_over_public_stun() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(!config.trickle);
        assert_eq!(config.signaling_server, DEFAULT_SIGNALING_SERVER);
        assert_eq!(config.ice_servers.len(), 2);
        assert!(config.ice_servers.iter().all(|s| s.kind == ServerKind::Stun));
    }

    #[test]
    fn environment_overrides_and_extends() {
        let config = Config::from_lookup(lookup(&[
            (SIGNALING_SERVER_ENV, "wss://relay.example.org"),
            (TRICKLE_ENV, "1"),
            (
                ICE_SERVERS_ENV,
                r#"[{"id":"t1","type":"turn","url":"relay.example.org:3478","username":"u","credential":"p"}]"#,
            ),
        ]))
        .unwrap();

        assert_eq!(config.signaling_server, "wss://relay.example.org");
        assert!(config.trickle);
        assert_eq!(config.ice_servers.len(), 3);
        assert_eq!(config.ice_servers[2].kind, ServerKind::Turn);
    }

    #[test]
    fn turn_without_credentials_is_rejected() {
        let err = Config::from_lookup(lookup(&[(
            ICE_SERVERS_ENV,
            r#"[{"id":"t1","type":"turn","url":"relay.example.org"}]"#,
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(id) if id == "t1"));
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(TRICKLE_ENV, "sometimes")])),
            Err(ConfigError::InvalidValue { key: TRICKLE_ENV, .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(ICE_SERVERS_ENV, "not json")])),
            Err(ConfigError::InvalidValue { key: ICE_SERVERS_ENV, .. })
        ));
        assert!(matches!(
            validate_servers(&[ServerConfig::stun("s", " ")]),
            Err(ConfigError::EmptyUrl(_))
        ));
    }
}
