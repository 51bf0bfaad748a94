//! Token command implementation.

use super::{CliError, CliResult};
use place_server::{AuthConfig, ServerConfig, TokenValidator};
use place_storage::{LocalDirectory, UserDirectory};
use std::path::Path;

/// Prints a fresh session token for `name`.
pub fn run(users_file: &Path, name: &str) -> CliResult<()> {
    let config = ServerConfig::from_env()?;
    if config.auth_secret.is_empty() {
        return Err(CliError::Usage(
            "PLACE_AUTH_SECRET must be set to issue tokens".into(),
        ));
    }

    let directory = LocalDirectory::open(users_file)?;
    let user = directory
        .find_by_name(name)?
        .ok_or_else(|| CliError::Usage(format!("no user named {name}")))?;

    let validator =
        TokenValidator::new(AuthConfig::new(config.auth_secret).with_expiry(config.token_expiry));
    println!("{}", validator.create_token(user.id)?);
    Ok(())
}
