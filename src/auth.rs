use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::RemoteConfig;
use crate::store::check;

/// Id of the single user in local mode.
pub const LOCAL_USER_ID: &str = "local";
pub const LOCAL_USER_EMAIL: &str = "local@localhost";

/// Refresh sessions that expire within this many seconds.
const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - EXPIRY_MARGIN_SECS <= now,
            None => false,
        }
    }
}

/// Identity of the person using the tracker.
pub trait AuthProvider {
    /// The session left over from a previous run, if still usable.
    fn restore(&self) -> Result<Option<Session>>;
    fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    /// Sign-up may not yield an access token when the backend requires
    /// email confirmation first.
    fn sign_up(&self, email: &str, password: &str) -> Result<Session>;
    fn sign_out(&self, session: &Session) -> Result<()>;
}

// --- Hosted auth service ---

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

/// Body of the token and signup endpoints. Signup answers with a bare user
/// object when confirmation is pending.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Option<AuthUser>,
    id: Option<String>,
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Result<Session> {
        let user = match self.user {
            Some(user) => User {
                id: user.id,
                email: user.email.unwrap_or_default(),
            },
            None => User {
                id: self.id.ok_or_else(|| anyhow!("Auth response did not include a user"))?,
                email: self.email.unwrap_or_default(),
            },
        };
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        Ok(Session {
            user,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Session persisted as JSON between runs.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("ignoring unreadable session file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display()))?;
        }
        Ok(())
    }
}

pub struct RemoteAuth {
    remote: RemoteConfig,
    sessions: SessionFile,
    client: Client,
}

impl RemoteAuth {
    pub fn new(remote: RemoteConfig, session_path: PathBuf) -> Self {
        Self {
            remote,
            sessions: SessionFile::new(session_path),
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.remote.base_url(), path)
    }

    fn request_session<B: Serialize>(&self, path: &str, body: &B) -> Result<Session> {
        debug!("POST auth/v1/{}", path);
        let response = self
            .client
            .post(self.endpoint(path))
            .header("apikey", &self.remote.anon_key)
            .json(body)
            .send()
            .context("Failed to reach the auth service")?;
        let response = check(response)?;
        let token: TokenResponse = response
            .json()
            .context("Failed to parse auth response")?;
        token.into_session(Utc::now().timestamp())
    }

    fn refresh(&self, refresh_token: &str) -> Result<Session> {
        self.request_session(
            "token?grant_type=refresh_token",
            &RefreshRequest { refresh_token },
        )
    }
}

impl AuthProvider for RemoteAuth {
    fn restore(&self) -> Result<Option<Session>> {
        let Some(session) = self.sessions.load()? else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now().timestamp()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            self.sessions.clear()?;
            return Ok(None);
        };
        match self.refresh(refresh_token) {
            Ok(fresh) => {
                info!("refreshed session for {}", fresh.user.email);
                self.sessions.save(&fresh)?;
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!("session refresh failed: {}", e);
                self.sessions.clear()?;
                Ok(None)
            }
        }
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session =
            self.request_session("token?grant_type=password", &Credentials { email, password })?;
        self.sessions.save(&session)?;
        debug!("saved session to {}", self.sessions.path().display());
        Ok(session)
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.request_session("signup", &Credentials { email, password })?;
        if session.access_token.is_some() {
            self.sessions.save(&session)?;
        }
        Ok(session)
    }

    fn sign_out(&self, session: &Session) -> Result<()> {
        self.sessions.clear()?;
        let Some(token) = session.access_token.as_deref() else {
            return Ok(());
        };
        debug!("POST auth/v1/logout");
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.remote.anon_key)
            .bearer_auth(token)
            .send()
            .context("Failed to reach the auth service")?;
        check(response)?;
        Ok(())
    }
}

// --- Local mode ---

/// Single built-in user for the local SQLite backend.
pub struct LocalAuth {
    user: User,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self {
            user: User {
                id: LOCAL_USER_ID.to_string(),
                email: LOCAL_USER_EMAIL.to_string(),
            },
        }
    }
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for LocalAuth {
    fn restore(&self) -> Result<Option<Session>> {
        Ok(Some(Session {
            user: self.user.clone(),
            access_token: None,
            refresh_token: None,
            expires_at: None,
        }))
    }

    fn sign_in(&self, _email: &str, _password: &str) -> Result<Session> {
        bail!(
            "Local mode has a single built-in user; no login needed. \
             Set JOBTRACK_SUPABASE_URL and JOBTRACK_SUPABASE_ANON_KEY to use a hosted account."
        )
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        self.sign_in(email, password)
    }

    fn sign_out(&self, _session: &Session) -> Result<()> {
        bail!("Local mode has no session to sign out of.")
    }
}
