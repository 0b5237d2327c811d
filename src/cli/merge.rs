use anyhow::Result;

use super::{open, parse_tenant};
use crate::config::NotesConfig;
use crate::notes::store;

/// Move every note owned by `from` to `to`.
///
/// This is the only path that changes a note's tenant. Typical use is folding
/// notes taken anonymously into a user account after it is created.
pub fn merge(config: &NotesConfig, from: &str, to: &str) -> Result<()> {
    let mut conn = open(config)?;
    let from_tenant = parse_tenant(&conn, from)?;
    let to_tenant = parse_tenant(&conn, to)?;

    let moved = store::reassign_notes(&mut conn, from_tenant, to_tenant)?;
    println!("Moved {moved} note(s) from {from_tenant} to {to_tenant}");
    Ok(())
}
