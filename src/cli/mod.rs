pub mod export;
pub mod merge;
pub mod stats;
pub mod user;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config::NotesConfig;
use crate::notes::types::Tenant;
use crate::notes::users;

/// Open the configured database for a one-shot command.
fn open(config: &NotesConfig) -> Result<Connection> {
    let db_path = config.resolved_db_path();
    crate::db::open_database(&db_path)
}

/// `anonymous` (any case) or an existing username.
fn parse_tenant(conn: &Connection, name: &str) -> Result<Tenant> {
    if name.trim().eq_ignore_ascii_case("anonymous") {
        return Ok(Tenant::Anonymous);
    }
    let user = users::get_user_by_username(conn, name)?
        .with_context(|| format!("no user named {name:?}"))?;
    Ok(user.tenant())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tenant_accepts_anonymous_and_usernames() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let ada = users::create_user(&mut conn, "ada", false).unwrap();

        assert_eq!(parse_tenant(&conn, "Anonymous").unwrap(), Tenant::Anonymous);
        assert_eq!(parse_tenant(&conn, "ADA").unwrap(), Tenant::User(ada.id));
        assert!(parse_tenant(&conn, "nobody").is_err());
    }
}
