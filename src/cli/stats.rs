use anyhow::Result;

use super::open;
use crate::config::NotesConfig;

/// Display database health and counts in the terminal.
pub fn stats(config: &NotesConfig) -> Result<()> {
    let conn = open(config)?;
    let report = crate::db::check_database_health(&conn)?;

    println!("Notes Database");
    println!("{}", "=".repeat(40));
    println!("  Path:                {}", config.resolved_db_path().display());
    println!("  Schema version:      {}", report.schema_version);
    println!(
        "  Integrity:           {}",
        if report.integrity_ok { "ok" } else { report.integrity_details.as_str() }
    );
    println!();
    println!("  Users:               {}", report.user_count);
    println!("  Notes:               {}", report.note_count);
    println!("  Anonymous notes:     {}", report.anonymous_note_count);

    Ok(())
}
