//! The agent-facing tool catalog and its dispatcher.
//!
//! Each tool's argument shape lives in its own module as a `schemars`-derived
//! struct; the same struct produces the JSON Schema advertised in `tools/list`
//! and parses the arguments of `tools/call`.

pub mod append_note;
pub mod create_note;
pub mod delete_note;
pub mod get_note;
pub mod list_recent_notes;
pub mod search_notes;
pub mod update_note;

use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use append_note::AppendNoteParams;
use create_note::CreateNoteParams;
use delete_note::DeleteNoteParams;
use get_note::GetNoteParams;
use list_recent_notes::ListRecentNotesParams;
use search_notes::SearchNotesParams;
use update_note::UpdateNoteParams;

use crate::config::LimitsConfig;
use crate::db::Pool;
use crate::error::{DispatchError, StoreError};
use crate::notes::store;
use crate::notes::types::Tenant;
use crate::session::CallContext;

fn tool<P: JsonSchema>(name: &'static str, description: &'static str) -> Tool {
    let schema = match serde_json::to_value(schemars::schema_for!(P)) {
        Ok(Value::Object(map)) => map,
        _ => JsonObject::new(),
    };
    Tool::new(name, description, Arc::new(schema))
}

/// Every tool, in the order advertised to agents.
pub fn catalog() -> Vec<Tool> {
    vec![
        tool::<CreateNoteParams>(create_note::NAME, create_note::DESCRIPTION),
        tool::<GetNoteParams>(get_note::NAME, get_note::DESCRIPTION),
        tool::<UpdateNoteParams>(update_note::NAME, update_note::DESCRIPTION),
        tool::<AppendNoteParams>(append_note::NAME, append_note::DESCRIPTION),
        tool::<ListRecentNotesParams>(list_recent_notes::NAME, list_recent_notes::DESCRIPTION),
        tool::<SearchNotesParams>(search_notes::NAME, search_notes::DESCRIPTION),
        tool::<DeleteNoteParams>(delete_note::NAME, delete_note::DESCRIPTION),
    ]
}

/// Arguments must be a JSON object. Serde would otherwise accept a positional
/// array for a struct, binding values by field order.
fn parse_args<P: DeserializeOwned>(tool: &str, args: Value) -> Result<P, StoreError> {
    if !args.is_object() {
        return Err(StoreError::Validation(format!(
            "Invalid arguments for {tool}: expected an object, got {}",
            json_kind(&args)
        )));
    }
    serde_json::from_value(args)
        .map_err(|e| StoreError::Validation(format!("Invalid arguments for {tool}: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn require_id(id: i64) -> Result<i64, StoreError> {
    if id > 0 {
        Ok(id)
    } else {
        Err(StoreError::Validation(format!("id must be a positive integer, got {id}")))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Unavailable(format!("serialization failed: {e}")))
}

/// Routes `tools/call` requests to the note store under the caller's tenant.
#[derive(Clone)]
pub struct ToolDispatcher {
    pool: Pool,
    limits: LimitsConfig,
    catalog: Arc<Vec<Tool>>,
}

impl ToolDispatcher {
    pub fn new(pool: Pool, limits: LimitsConfig) -> Self {
        Self {
            pool,
            limits,
            catalog: Arc::new(catalog()),
        }
    }

    pub fn catalog(&self) -> &[Tool] {
        &self.catalog
    }

    /// Run a tool for the tenant bound in `ctx`.
    ///
    /// Domain failures (missing note, bad arguments) come back as `Ok` results
    /// with `isError` set. Only unknown tools and store faults are `Err`.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, DispatchError> {
        let tenant = ctx.current_identity();
        let args = match arguments {
            None | Some(Value::Null) => Value::Object(JsonObject::new()),
            Some(args) => args,
        };
        tracing::info!(tool = name, "tool called");

        let outcome = match name {
            create_note::NAME => self.create_note(tenant, args).await,
            get_note::NAME => self.get_note(tenant, args).await,
            update_note::NAME => self.update_note(tenant, args).await,
            append_note::NAME => self.append_note(tenant, args).await,
            list_recent_notes::NAME => self.list_recent_notes(tenant, args).await,
            search_notes::NAME => self.search_notes(tenant, args).await,
            delete_note::NAME => self.delete_note(tenant, args).await,
            other => {
                tracing::warn!(tool = other, "unknown tool");
                return Err(DispatchError::UnknownTool(other.to_string()));
            }
        };

        match outcome {
            Ok(value) => {
                let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) if e.is_domain() => {
                tracing::info!(tool = name, error = %e, "tool returned an error result");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
            Err(e) => {
                tracing::error!(tool = name, error = %e, "tool failed");
                Err(DispatchError::Infrastructure(e))
            }
        }
    }

    fn tool_limit(&self, requested: Option<i64>) -> Result<usize, StoreError> {
        let max = self.limits.notes_max_limit;
        match requested {
            None => Ok(self.limits.notes_default_limit.clamp(1, max.max(1))),
            Some(n) if n >= 1 && (n as u64) <= max as u64 => Ok(n as usize),
            Some(n) => Err(StoreError::Validation(format!(
                "limit must be between 1 and {max}, got {n}"
            ))),
        }
    }

    async fn create_note(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: CreateNoteParams = parse_args(create_note::NAME, args)?;
        let note = self
            .pool
            .run(move |conn| store::create_note(conn, tenant, &p.title, &p.content))
            .await?;
        tracing::info!(note_id = note.id, "note created");
        to_json(&note)
    }

    async fn get_note(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: GetNoteParams = parse_args(get_note::NAME, args)?;
        let id = require_id(p.id)?;
        let note = self.pool.run(move |conn| store::get_note(conn, tenant, id)).await?;
        to_json(&note)
    }

    async fn update_note(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: UpdateNoteParams = parse_args(update_note::NAME, args)?;
        let id = require_id(p.id)?;
        let update = p.to_update();
        if update.is_empty() {
            return Err(StoreError::Validation("No updates provided".into()));
        }
        let note = self
            .pool
            .run(move |conn| store::update_note(conn, tenant, id, &update))
            .await?;
        to_json(&note)
    }

    async fn append_note(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: AppendNoteParams = parse_args(append_note::NAME, args)?;
        let id = require_id(p.id)?;
        let note = self
            .pool
            .run(move |conn| store::append_note(conn, tenant, id, &p.content))
            .await?;
        to_json(&note)
    }

    async fn list_recent_notes(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: ListRecentNotesParams = parse_args(list_recent_notes::NAME, args)?;
        let limit = self.tool_limit(p.limit)?;
        let notes = self
            .pool
            .run(move |conn| store::search_notes(conn, tenant, None, limit))
            .await?;
        to_json(&notes)
    }

    async fn search_notes(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: SearchNotesParams = parse_args(search_notes::NAME, args)?;
        let limit = self.tool_limit(p.limit)?;
        let keyword = p.keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(StoreError::Validation(
                "keyword is required and cannot be empty".into(),
            ));
        }
        let notes = self
            .pool
            .run(move |conn| store::search_notes(conn, tenant, Some(keyword.as_str()), limit))
            .await?;
        to_json(&notes)
    }

    async fn delete_note(&self, tenant: Tenant, args: Value) -> Result<Value, StoreError> {
        let p: DeleteNoteParams = parse_args(delete_note::NAME, args)?;
        let id = require_id(p.id)?;
        let note = self.pool.run(move |conn| store::delete_note(conn, tenant, id)).await?;
        tracing::info!(note_id = id, "note deleted");
        to_json(&note)
    }
}
