//! User command implementation.

use super::{CliError, CliResult};
use clap::Subcommand;
use place_storage::{LocalDirectory, Role, UserDirectory, UserRecord};
use std::path::Path;

/// User directory actions.
#[derive(Debug, Subcommand)]
pub enum UserAction {
    /// Add a user
    Add {
        /// Display name
        name: String,

        /// Role (user, moderator, admin)
        #[arg(short, long, default_value = "user")]
        role: Role,
    },

    /// List users
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Ban a user
    Ban {
        /// Display name
        name: String,
    },

    /// Lift a ban
    Unban {
        /// Display name
        name: String,
    },
}

/// Runs a user directory action against `users_file`.
pub fn run(users_file: &Path, action: UserAction) -> CliResult<()> {
    let directory = LocalDirectory::open(users_file)?;
    match action {
        UserAction::Add { name, role } => {
            let record = directory.add_user(&name, role)?;
            println!("Added {} (id {}, {})", record.name, record.id, record.role);
        }
        UserAction::List { format } => {
            let users = directory.list();
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&users)?),
                _ => print_table(&users),
            }
        }
        UserAction::Ban { name } => set_banned(&directory, &name, true)?,
        UserAction::Unban { name } => set_banned(&directory, &name, false)?,
    }
    Ok(())
}

fn set_banned(directory: &LocalDirectory, name: &str, banned: bool) -> CliResult<()> {
    let user = directory
        .find_by_name(name)?
        .ok_or_else(|| CliError::Usage(format!("no user named {name}")))?;
    directory.set_banned(user.id, banned)?;
    println!(
        "{} {}",
        user.name,
        if banned { "banned" } else { "unbanned" }
    );
    Ok(())
}

fn print_table(users: &[UserRecord]) {
    println!("{:>6}  {:<20} {:<10} {:>8}  {}", "ID", "NAME", "ROLE", "PLACED", "STATUS");
    for user in users {
        println!(
            "{:>6}  {:<20} {:<10} {:>8}  {}",
            user.id,
            user.name,
            user.role.to_string(),
            user.blocks_placed,
            if user.banned { "banned" } else { "active" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_ban_and_unban() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        run(
            &path,
            UserAction::Add {
                name: "alice".into(),
                role: Role::Moderator,
            },
        )
        .unwrap();
        run(&path, UserAction::Ban { name: "ALICE".into() }).unwrap();

        let directory = LocalDirectory::open(&path).unwrap();
        let alice = directory.find_by_name("alice").unwrap().unwrap();
        assert!(alice.banned);
        assert_eq!(alice.role, Role::Moderator);

        run(&path, UserAction::Unban { name: "alice".into() }).unwrap();
        let directory = LocalDirectory::open(&path).unwrap();
        assert!(!directory.find_by_name("alice").unwrap().unwrap().banned);
    }

    #[test]
    fn unknown_user_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let result = run(&path, UserAction::Ban { name: "ghost".into() });
        assert!(matches!(result, Err(CliError::Usage(_))));
    }
}
