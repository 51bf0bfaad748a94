//! Server configuration.

use crate::error::{ServerError, ServerResult};
use place_protocol::CanvasSpec;
use place_storage::Placement;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which `PLACE` commands are rejected as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatPolicy {
    /// Reject a placement whose color equals the pixel's current color,
    /// whoever painted it.
    #[default]
    SameColor,
    /// Reject only when the same user already painted that color there.
    SameColorSameUser,
}

impl RepeatPolicy {
    /// Returns true if placing `color` as `user` over `last` is a no-op.
    pub fn rejects(self, last: &Placement, user: &str, color: u8) -> bool {
        match self {
            RepeatPolicy::SameColor => last.color == color,
            RepeatPolicy::SameColorSameUser => last.color == color && last.user == user,
        }
    }
}

impl FromStr for RepeatPolicy {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "same-color" => Ok(RepeatPolicy::SameColor),
            "same-color-same-user" => Ok(RepeatPolicy::SameColorSameUser),
            other => Err(ServerError::Config(format!("unknown repeat policy: {other}"))),
        }
    }
}

/// Configuration for the canvas server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Canvas dimensions and palette.
    pub canvas: CanvasSpec,
    /// Initial placement cooldown in seconds (changeable with `SETCOOLDOWN`).
    pub cooldown_secs: u64,
    /// Number of blocking storage jobs allowed in flight.
    pub worker_threads: usize,
    /// Directory of the placement log; `None` keeps placements in memory.
    pub data_dir: Option<PathBuf>,
    /// JSON user directory; `None` keeps users in memory.
    pub users_file: Option<PathBuf>,
    /// Secret key for token validation.
    pub auth_secret: Vec<u8>,
    /// How long a token stays valid after it is issued.
    pub token_expiry: Duration,
    /// No-op placement rule.
    pub repeat_policy: RepeatPolicy,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            canvas: CanvasSpec::default(),
            cooldown_secs: 0,
            worker_threads: 4,
            data_dir: None,
            users_file: None,
            auth_secret: Vec::new(),
            token_expiry: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            repeat_policy: RepeatPolicy::SameColor,
        }
    }

    /// Reads the configuration from `PLACE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if a variable is malformed or the
    /// result fails [`ServerConfig::validate`].
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(key: &str, value: String) -> ServerResult<T> {
            value
                .trim()
                .parse()
                .map_err(|_| ServerError::Config(format!("{key}: cannot parse {value:?}")))
        }

        let mut config = Self::default();

        let host = lookup("PLACE_HOST").unwrap_or_else(|| config.bind_addr.ip().to_string());
        let port: u16 = match lookup("PLACE_PORT") {
            Some(value) => parse("PLACE_PORT", value)?,
            None => config.bind_addr.port(),
        };
        config.bind_addr = parse("PLACE_HOST", format!("{host}:{port}"))
            .or_else(|_| parse("PLACE_HOST", format!("[{host}]:{port}")))?;

        if let Some(value) = lookup("PLACE_WIDTH") {
            config.canvas.width = parse("PLACE_WIDTH", value)?;
        }
        if let Some(value) = lookup("PLACE_HEIGHT") {
            config.canvas.height = parse("PLACE_HEIGHT", value)?;
        }
        if let Some(value) = lookup("PLACE_PALETTE_SIZE") {
            config.canvas.palette_size = parse("PLACE_PALETTE_SIZE", value)?;
        }
        if let Some(value) = lookup("PLACE_COOLDOWN") {
            config.cooldown_secs = parse("PLACE_COOLDOWN", value)?;
        }
        if let Some(value) = lookup("PLACE_WORKERS") {
            config.worker_threads = parse("PLACE_WORKERS", value)?;
        }
        if let Some(value) = lookup("PLACE_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("PLACE_USERS_FILE") {
            config.users_file = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("PLACE_AUTH_SECRET") {
            config.auth_secret = value.into_bytes();
        }
        if let Some(value) = lookup("PLACE_TOKEN_EXPIRY") {
            config.token_expiry = Duration::from_secs(parse("PLACE_TOKEN_EXPIRY", value)?);
        }
        if let Some(value) = lookup("PLACE_REPEAT_POLICY") {
            config.repeat_policy = value.parse()?;
        }

        Ok(config)
    }

    /// Checks that the configuration can run a server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] describing the first problem found.
    pub fn validate(&self) -> ServerResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ServerError::Config("canvas dimensions must be non-zero".into()));
        }
        if self.canvas.palette_size == 0 || self.canvas.palette_size > 256 {
            return Err(ServerError::Config(format!(
                "palette size must be between 1 and 256, got {}",
                self.canvas.palette_size
            )));
        }
        if self.worker_threads == 0 {
            return Err(ServerError::Config("worker_threads must be at least 1".into()));
        }
        if self.auth_secret.is_empty() {
            return Err(ServerError::Config(
                "an auth secret is required (PLACE_AUTH_SECRET)".into(),
            ));
        }
        Ok(())
    }

    /// Sets the canvas dimensions and palette.
    pub fn with_canvas(mut self, canvas: CanvasSpec) -> Self {
        self.canvas = canvas;
        self
    }

    /// Sets the initial cooldown.
    pub fn with_cooldown(mut self, seconds: u64) -> Self {
        self.cooldown_secs = seconds;
        self
    }

    /// Sets the worker pool size.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Persists placements in `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Persists users in the JSON file at `path`.
    pub fn with_users_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.users_file = Some(path.into());
        self
    }

    /// Sets the token secret.
    pub fn with_auth_secret(mut self, secret: Vec<u8>) -> Self {
        self.auth_secret = secret;
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the no-op placement rule.
    pub fn with_repeat_policy(mut self, policy: RepeatPolicy) -> Self {
        self.repeat_policy = policy;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8765)))
    }
}
