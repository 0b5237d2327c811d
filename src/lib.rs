//! Personal notes with an agent-facing tool surface.
//!
//! `local-notes` stores notes in SQLite and exposes them two ways: a REST API
//! for a human-facing client, and MCP tools for an agent connected over one
//! long-lived SSE stream. Every note belongs to a tenant, either a user or the
//! anonymous bucket, and the tenant of an agent's calls is fixed when its
//! stream opens.
//!
//! # Request flow
//!
//! 1. `GET /mcp` (or `/mcp/{api_key}`) resolves credentials to a [`notes::types::Tenant`]
//!    via [`identity::IdentityResolver`] and registers a [`session::Session`].
//! 2. The stream's first event names the message endpoint and session id; a
//!    heartbeat comment follows on a fixed interval.
//! 3. Each `POST` to the message endpoint is looked up by session id, bound to
//!    a [`session::CallContext`], and dispatched by [`tools::ToolDispatcher`].
//! 4. The JSON-RPC response is written back onto the stream, not the POST.
//!
//! # Modules
//!
//! - [`config`]: TOML + environment configuration
//! - [`db`]: SQLite schema, migrations, health checks, and the connection pool
//! - [`notes`]: tenant-scoped note storage and the user table
//! - [`identity`]: API key / cookie resolution
//! - [`session`]: registry, connection lifecycle, and call context
//! - [`tools`]: the MCP tool catalog and dispatcher
//! - [`server`]: axum routes for MCP and REST

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod notes;
pub mod server;
pub mod session;
pub mod tools;
