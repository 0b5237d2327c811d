use anyhow::Result;

use super::{open, parse_tenant};
use crate::config::NotesConfig;
use crate::notes::store;
use crate::server::api::ExportDocument;

/// Print one tenant's notes as JSON to stdout. Defaults to the anonymous bucket.
pub fn export(config: &NotesConfig, user: Option<&str>) -> Result<()> {
    let conn = open(config)?;
    let tenant = match user {
        Some(name) => parse_tenant(&conn, name)?,
        None => crate::notes::types::Tenant::Anonymous,
    };

    let doc = ExportDocument {
        version: "1.0".into(),
        username: user.unwrap_or("anonymous").to_string(),
        exported_at: store::now_timestamp(),
        notes: store::list_notes(&conn, tenant)?,
    };

    let json = serde_json::to_string_pretty(&doc)?;
    println!("{json}");

    eprintln!("Exported {} note(s) for {tenant}", doc.notes.len());
    Ok(())
}
