//! MCP server that exposes the GitHub REST API as tools: repositories,
//! files, branches and commits, issues, pull requests, Actions, users,
//! gists and search.
//!
//! Served over streamable HTTP on `/mcp` (guarded by an API key) or over
//! stdio. Which repositories tools may touch is limited by an allow-list.

pub mod config;
pub mod error;
pub mod github;
pub mod http;
pub mod server;
