//! Persisted login session.
//!
//! The token and the user record live under two fixed keys in one JSON
//! file, read at startup and cleared on logout. The user record is stored
//! as a JSON-encoded string under its key, so a corrupt user entry costs
//! only the user, never the token.

use crate::models::{AuthSession, User};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const AUTH_TOKEN_KEY: &str = "moderator_cafe_auth_token";
const AUTH_USER_KEY: &str = "moderator_cafe_auth_user";

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn from_env() -> Self {
        let path = std::env::var("CAFE_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_path());
        Self { path }
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Stored session, or an empty one. Never fails: a missing or corrupt
    /// file is the same as being logged out.
    pub fn load(&self) -> AuthSession {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return AuthSession::default();
        };
        let Ok(stored) = serde_json::from_str::<Value>(&raw) else {
            warn!(target = "cafe.console", path = %self.path.display(), "session file unreadable");
            return AuthSession::default();
        };

        let token = stored
            .get(AUTH_TOKEN_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let user = stored
            .get(AUTH_USER_KEY)
            .and_then(Value::as_str)
            .and_then(|raw_user| serde_json::from_str::<User>(raw_user).ok());

        AuthSession { token, user }
    }

    pub fn save(&self, token: &str, user: Option<&User>) -> std::io::Result<()> {
        let user_raw = user
            .and_then(|user| serde_json::to_string(user).ok())
            .unwrap_or_else(|| "null".to_string());
        let mut stored = serde_json::Map::new();
        stored.insert(AUTH_TOKEN_KEY.to_string(), Value::String(token.to_string()));
        stored.insert(AUTH_USER_KEY.to_string(), Value::String(user_raw));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, Value::Object(stored).to_string())
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cafe-admin")
        .join("session.json")
}
