use anyhow::{Context, Result};

use super::open;
use crate::config::NotesConfig;
use crate::identity::key_prefix;
use crate::notes::users;

/// Create a user and print its API key.
pub fn add(config: &NotesConfig, username: &str, admin: bool) -> Result<()> {
    let mut conn = open(config)?;
    let user = users::create_user(&mut conn, username, admin)?;

    println!("Created user {} (id {})", user.username, user.id);
    if user.is_admin {
        println!("  Role:     admin");
    }
    println!("  API key:  {}", user.api_key);
    println!();
    println!("Connect an agent with: http://{}/mcp/{}", config.bind_addr(), user.api_key);
    Ok(())
}

/// List users with their note counts. Keys are shown as prefixes only.
pub fn list(config: &NotesConfig) -> Result<()> {
    let conn = open(config)?;
    let summaries = users::list_users(&conn)?;

    if summaries.is_empty() {
        println!("No users. Create one with `local-notes user add <username>`.");
        return Ok(());
    }

    println!("{:<6} {:<24} {:<8} {:>7}  {:<10} Last note", "ID", "Username", "Role", "Notes", "Key");
    println!("{}", "-".repeat(80));
    for s in &summaries {
        println!(
            "{:<6} {:<24} {:<8} {:>7}  {:<10} {}",
            s.user.id,
            s.user.username,
            if s.user.is_admin { "admin" } else { "user" },
            s.note_count,
            key_prefix(&s.user.api_key),
            s.last_note_at.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Replace a user's API key. Sessions already open keep their identity.
pub fn rotate_key(config: &NotesConfig, username: &str) -> Result<()> {
    let conn = open(config)?;
    let user = users::rotate_api_key(&conn, username)?;
    println!("New API key for {}: {}", user.username, user.api_key);
    Ok(())
}

/// Give a user a new name. Its id, key and notes are unchanged.
pub fn rename(config: &NotesConfig, username: &str, new_username: &str) -> Result<()> {
    let mut conn = open(config)?;
    let user = users::get_user_by_username(&conn, username)?
        .with_context(|| format!("no user named {username:?}"))?;
    let renamed = users::rename_user(&mut conn, user.id, new_username)?;
    println!("Renamed {} to {}", user.username, renamed.username);
    Ok(())
}

/// Delete a user and every note it owns.
pub fn delete(config: &NotesConfig, username: &str) -> Result<()> {
    let mut conn = open(config)?;
    let user = users::get_user_by_username(&conn, username)?
        .with_context(|| format!("no user named {username:?}"))?;
    let notes = users::delete_user(&mut conn, user.id)?;
    println!("Deleted user {} and {notes} note(s)", user.username);
    Ok(())
}
