//! Command dispatch.
//!
//! A connection is anonymous until `AUTH` succeeds. Each line is parsed,
//! authorized and then carried out; every reply and broadcast is queued
//! through the [`SessionRegistry`], the issuer's acknowledgement first.

use crate::auth::{AuthConfig, Authenticator, TokenValidator};
use crate::canvas::CanvasCache;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::{ConnectionId, Outbound, SessionRegistry};
use crate::worker::WorkerPool;
use parking_lot::Mutex;
use place_protocol::{Command, Keyword, Rect, Reply};
use place_storage::{now_seconds, PlacementStore, UserDirectory, UserId, UserRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Shared state for all connections.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Canvas cache over the placement store.
    pub canvas: Arc<CanvasCache>,
    /// User directory.
    pub directory: Arc<dyn UserDirectory>,
    /// Token resolution.
    pub auth: Arc<Authenticator>,
    /// Open connections.
    pub registry: Arc<SessionRegistry>,
    /// Pool for blocking storage calls.
    pub workers: WorkerPool,
    cooldown_secs: AtomicU64,
    last_placer: Mutex<Option<UserId>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn PlacementStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let validator = TokenValidator::new(
            AuthConfig::new(config.auth_secret.clone()).with_expiry(config.token_expiry),
        );
        Self {
            canvas: Arc::new(CanvasCache::new(config.canvas, store)),
            auth: Arc::new(Authenticator::new(validator, Arc::clone(&directory))),
            directory,
            registry: Arc::new(SessionRegistry::new()),
            workers: WorkerPool::new(config.worker_threads),
            cooldown_secs: AtomicU64::new(config.cooldown_secs),
            last_placer: Mutex::new(None),
            config,
        }
    }

    /// Current placement cooldown in seconds.
    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs.load(Ordering::Relaxed)
    }

    /// The user who made the most recent accepted placement.
    pub fn last_placer(&self) -> Option<UserId> {
        *self.last_placer.lock()
    }
}

/// Parses and executes client lines.
#[derive(Clone)]
pub struct CommandDispatcher {
    context: Arc<HandlerContext>,
}

impl CommandDispatcher {
    /// Creates a new dispatcher.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Handles one line from connection `conn`.
    ///
    /// Returns the direct reply queued for `conn`, if the command produced
    /// one. Broadcasts and notifications to other connections are queued
    /// as a side effect.
    pub async fn dispatch(&self, conn: ConnectionId, line: &str) -> Option<Reply> {
        let outcome = match Command::parse(line) {
            Ok(command) => {
                let keyword = command.keyword();
                if keyword != Keyword::Ping {
                    debug!(conn, command = keyword.as_str(), "dispatching");
                }
                self.execute(conn, command).await
            }
            Err(err) => {
                debug!(conn, error = %err, "unparseable command");
                match err.keyword() {
                    Some(keyword) => self
                        .authorize(conn, keyword)
                        .and_then(|_| Err(ServerError::from(err))),
                    None => Err(ServerError::from(err)),
                }
            }
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(err) if err.is_server_error() => {
                error!(conn, error = %err, "command failed");
                Some(err.reply())
            }
            Err(err) => {
                debug!(conn, error = %err, "command rejected");
                Some(err.reply())
            }
        };

        if let Some(reply) = &reply {
            self.context.registry.send_to(conn, reply);
        }
        reply
    }

    /// Queues the full canvas into `outbox`, the color frame then the
    /// `USERS` line, and registers it as a new anonymous connection.
    ///
    /// Both happen under the canvas lock, so every broadcast the
    /// connection receives is queued behind its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be built; nothing is
    /// registered in that case.
    pub async fn join(&self, outbox: UnboundedSender<Outbound>) -> ServerResult<ConnectionId> {
        let canvas = Arc::clone(&self.context.canvas);
        let registry = Arc::clone(&self.context.registry);
        self.context
            .workers
            .run(move || {
                canvas.with_snapshot(|snapshot| {
                    let _ = outbox.send(Outbound::Binary(Arc::clone(snapshot.colors())));
                    let _ = outbox.send(Outbound::Text(Arc::clone(snapshot.users_line())));
                    registry.register(outbox)
                })
            })
            .await
    }

    /// Returns true if repeated lines from `conn` should be dropped: the
    /// connection is authenticated and its user made the latest placement.
    pub fn suppression_armed(&self, conn: ConnectionId) -> bool {
        match self.context.registry.user_id_of(conn) {
            Some(user_id) => self.context.last_placer() == Some(user_id),
            None => false,
        }
    }

    /// Checks that `conn` may issue `keyword`, before its arguments are
    /// looked at. Returns the connection's user, if any.
    fn authorize(&self, conn: ConnectionId, keyword: Keyword) -> ServerResult<Option<UserRecord>> {
        let user = self.context.registry.user_of(conn);
        match keyword {
            Keyword::Ping => Ok(user),
            Keyword::Auth => match user {
                Some(_) => Err(ServerError::AlreadyAuthenticated),
                None => Ok(None),
            },
            Keyword::Place
            | Keyword::Clear
            | Keyword::Ban
            | Keyword::SetCooldown
            | Keyword::ClearUser => match user {
                Some(user) if keyword.requires_moderator() && !user.can_moderate() => Err(
                    ServerError::Forbidden(format!("{} is not a moderator", user.name)),
                ),
                Some(user) => Ok(Some(user)),
                None => Err(ServerError::Forbidden("not authenticated".into())),
            },
        }
    }

    async fn execute(&self, conn: ConnectionId, command: Command) -> ServerResult<Option<Reply>> {
        let user = self.authorize(conn, command.keyword())?;
        match (command, user) {
            (Command::Ping, _) => Ok(Some(Reply::Pong)),
            (Command::Auth { token }, _) => self.auth(conn, token).await,
            (Command::Place { x, y, color }, Some(user)) => self.place(conn, user, x, y, color).await,
            (Command::Clear { x1, y1, x2, y2 }, Some(user)) => {
                let rect = self
                    .context
                    .canvas
                    .spec()
                    .checked_rect(x1, y1, x2, y2)
                    .ok_or_else(|| {
                        ServerError::Protocol(format!("bad rectangle {x1} {y1} {x2} {y2}"))
                    })?;
                self.clear(conn, &user, rect).await
            }
            (Command::Ban { name }, Some(user)) => self.ban(&user, name).await,
            (Command::SetCooldown { seconds }, Some(user)) => {
                self.set_cooldown(&user, seconds);
                Ok(None)
            }
            (Command::ClearUser { name }, Some(user)) => self.clear_user(&user, name).await,
            (_, None) => Err(ServerError::Forbidden("not authenticated".into())),
        }
    }

    async fn auth(&self, conn: ConnectionId, token: String) -> ServerResult<Option<Reply>> {
        let auth = Arc::clone(&self.context.auth);
        let record = self.context.workers.run(move || auth.resolve(&token)).await?;
        if record.banned {
            return Err(ServerError::Forbidden(format!("{} is banned", record.name)));
        }

        let registry = &self.context.registry;
        let Some(shared) = registry.authenticate(conn, record) else {
            // Connection closed while the token was being checked
            return Ok(None);
        };
        info!(conn, user = %shared.name, "authenticated");
        registry.send_to(conn, Reply::AuthenticationSuccess);

        let cooldown = self.context.cooldown_secs();
        if shared.in_cooldown(now_seconds(), cooldown) {
            return Ok(Some(Reply::Cooldown {
                until_ms: shared.cooldown_ends_ms(cooldown),
            }));
        }
        Ok(None)
    }

    async fn place(
        &self,
        conn: ConnectionId,
        user: UserRecord,
        x: i64,
        y: i64,
        color: i64,
    ) -> ServerResult<Option<Reply>> {
        let spec = self.context.canvas.spec();
        let (x, y) = spec
            .checked_point(x, y)
            .ok_or_else(|| ServerError::Protocol(format!("pixel {x} {y} is off the canvas")))?;
        let color = spec
            .checked_color(color)
            .ok_or_else(|| ServerError::Protocol(format!("color {color} is not in the palette")))?;

        let registry = &self.context.registry;
        let lock = registry
            .placement_lock(user.id)
            .ok_or_else(|| ServerError::Forbidden("not authenticated".into()))?;
        let _placing = lock.lock().await;

        // Re-read under the lock; another session of this user may have just placed
        let user = registry
            .user(user.id)
            .ok_or_else(|| ServerError::Forbidden("not authenticated".into()))?;
        let cooldown = self.context.cooldown_secs();
        if !user.can_place(now_seconds(), cooldown) {
            let reason = if user.banned { "is banned" } else { "is cooling down" };
            return Err(ServerError::Forbidden(format!("{} {reason}", user.name)));
        }

        let canvas = Arc::clone(&self.context.canvas);
        let policy = self.context.config.repeat_policy;
        let name = user.name.clone();
        let placement = self
            .context
            .workers
            .run(move || {
                if let Some(last) = canvas.last_pixel(x, y)? {
                    if policy.rejects(&last, &name, color) {
                        return Err(ServerError::Forbidden(format!(
                            "pixel {x} {y} already has color {color}"
                        )));
                    }
                }
                canvas.place(&name, x, y, color)
            })
            .await?;

        let directory = Arc::clone(&self.context.directory);
        let (user_id, timestamp) = (user.id, placement.timestamp);
        match self
            .context
            .workers
            .run(move || Ok(directory.record_placement(user_id, timestamp)?))
            .await
        {
            Ok(Some(updated)) => {
                registry.update_user(updated);
            }
            Ok(None) => {
                warn!(user = %user.name, "placing user missing from directory");
                registry.with_user_mut(user.id, |r| r.note_placement(timestamp));
            }
            Err(err) => {
                warn!(user = %user.name, error = %err, "failed to persist placement counters");
                registry.with_user_mut(user.id, |r| r.note_placement(timestamp));
            }
        }
        *self.context.last_placer.lock() = Some(user.id);
        debug!(conn, user = %user.name, x, y, color, "placed pixel");

        let ack = Reply::Place {
            user: user.name.clone(),
            x,
            y,
            color,
        };
        registry.send_to(conn, &ack);
        if cooldown > 0 {
            let mut notified = user;
            notified.last_placement = timestamp;
            registry.send_to_user(
                notified.id,
                Reply::Cooldown {
                    until_ms: notified.cooldown_ends_ms(cooldown),
                },
            );
        }
        registry.broadcast(ack, Some(conn));
        Ok(None)
    }

    async fn clear(
        &self,
        conn: ConnectionId,
        moderator: &UserRecord,
        rect: Rect,
    ) -> ServerResult<Option<Reply>> {
        let canvas = Arc::clone(&self.context.canvas);
        self.context.workers.run(move || canvas.clear_rect(rect)).await?;
        info!(moderator = %moderator.name, "rectangle cleared");

        let reply = Reply::Clear {
            x1: rect.x1,
            y1: rect.y1,
            x2: rect.x2,
            y2: rect.y2,
        };
        let registry = &self.context.registry;
        registry.send_to(conn, &reply);
        registry.broadcast(reply, Some(conn));
        Ok(None)
    }

    async fn ban(&self, moderator: &UserRecord, name: String) -> ServerResult<Option<Reply>> {
        let directory = Arc::clone(&self.context.directory);
        let lookup = name.clone();
        let target = self
            .context
            .workers
            .run(move || Ok(directory.find_by_name(&lookup)?))
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("no user named {name}")))?;

        if target.can_moderate() {
            return Err(ServerError::Forbidden(format!(
                "{} is a moderator",
                target.name
            )));
        }
        let registry = &self.context.registry;
        let already_banned = registry
            .user(target.id)
            .map_or(target.banned, |shared| shared.banned);
        if already_banned {
            return Ok(None);
        }

        let directory = Arc::clone(&self.context.directory);
        let target_id = target.id;
        self.context
            .workers
            .run(move || Ok(directory.set_banned(target_id, true)?))
            .await?;
        registry.with_user_mut(target.id, |r| r.banned = true);
        let notified = registry.send_to_user(target.id, Reply::Banned);
        info!(moderator = %moderator.name, user = %target.name, notified, "user banned");
        Ok(None)
    }

    fn set_cooldown(&self, moderator: &UserRecord, seconds: u64) {
        self.context.cooldown_secs.store(seconds, Ordering::Relaxed);
        info!(moderator = %moderator.name, seconds, "cooldown changed");

        let now = now_seconds();
        let registry = &self.context.registry;
        for user in registry.authenticated_users() {
            if user.in_cooldown(now, seconds) {
                registry.send_to_user(
                    user.id,
                    Reply::Cooldown {
                        until_ms: user.cooldown_ends_ms(seconds),
                    },
                );
            }
        }
    }

    async fn clear_user(&self, moderator: &UserRecord, name: String) -> ServerResult<Option<Reply>> {
        let canvas = Arc::clone(&self.context.canvas);
        let removed = self
            .context
            .workers
            .run(move || canvas.clear_user(&name))
            .await?;
        info!(moderator = %moderator.name, removed, "user placements cleared");

        if self.context.canvas.is_cold() {
            let canvas = Arc::clone(&self.context.canvas);
            let snapshot = self.context.workers.run(move || canvas.snapshot()).await?;
            let registry = &self.context.registry;
            registry.broadcast(Outbound::Binary(Arc::clone(snapshot.colors())), None);
            registry.broadcast(Outbound::Text(Arc::clone(snapshot.users_line())), None);
        }
        Ok(None)
    }
}
