//! Serve command implementation.

use super::CliResult;
use clap::Args;
use place_server::{PlaceServer, RepeatPolicy, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// Overrides for the environment configuration.
#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Address to bind, e.g. 0.0.0.0:8765
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Canvas width in pixels
    #[arg(long)]
    pub width: Option<u16>,

    /// Canvas height in pixels
    #[arg(long)]
    pub height: Option<u16>,

    /// Number of palette colors
    #[arg(long)]
    pub palette_size: Option<u16>,

    /// Placement cooldown in seconds
    #[arg(long)]
    pub cooldown: Option<u64>,

    /// Placement log directory (omit to keep placements in memory)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// User directory file (omit to keep users in memory)
    #[arg(long)]
    pub users_file: Option<PathBuf>,

    /// Blocking worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Repeat placement policy (same-color, same-color-same-user)
    #[arg(long)]
    pub repeat_policy: Option<RepeatPolicy>,
}

impl ServeArgs {
    /// Applies the flags that were given on top of `config`.
    pub fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(width) = self.width {
            config.canvas.width = width;
        }
        if let Some(height) = self.height {
            config.canvas.height = height;
        }
        if let Some(palette_size) = self.palette_size {
            config.canvas.palette_size = palette_size;
        }
        if let Some(cooldown) = self.cooldown {
            config.cooldown_secs = cooldown;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(path) = self.users_file {
            config.users_file = Some(path);
        }
        if let Some(workers) = self.workers {
            config.worker_threads = workers;
        }
        if let Some(policy) = self.repeat_policy {
            config.repeat_policy = policy;
        }
        config
    }
}

/// Runs the serve command until Ctrl-C.
pub fn run(args: ServeArgs) -> CliResult<()> {
    let config = args.apply(ServerConfig::from_env()?);
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = PlaceServer::bind(config).await?;
        info!(addr = %server.local_addr()?, "press Ctrl-C to stop");
        server
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
    })?;
    Ok(())
}
