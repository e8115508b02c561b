use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::model::*;
use rmcp::service::RequestContext;
use rmcp::{schemars, tool_handler, RoleServer, ServerHandler};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{RepoRef, RepoScope, Settings};
use crate::error::McpGithubError;
use crate::github::{sanitize_github_name, GithubClient};

mod actions;
mod branches;
mod files;
mod gists;
mod issues;
mod pulls;
mod repositories;
mod search;
mod users;

pub use actions::*;
pub use branches::*;
pub use files::*;
pub use gists::*;
pub use issues::*;
pub use pulls::*;
pub use repositories::*;
pub use search::*;
pub use users::*;

pub const USER_RESOURCE_URI: &str = "github://user";

// -- Parameter types shared across tool groups --

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct RepoParams {
    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct RepoPageParams {
    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Clone)]
pub struct McpGithubServer {
    github: GithubClient,
    scope: Arc<RepoScope>,
    server_name: String,
    max_results: u32,
    tool_router: ToolRouter<Self>,
}

impl McpGithubServer {
    pub fn new(
        github: GithubClient,
        scope: Arc<RepoScope>,
        server_name: impl Into<String>,
        max_results: u32,
    ) -> Self {
        Self {
            github,
            scope,
            server_name: server_name.into(),
            max_results,
            tool_router: Self::repository_router()
                + Self::file_router()
                + Self::branch_router()
                + Self::issue_router()
                + Self::pull_router()
                + Self::action_router()
                + Self::user_router()
                + Self::gist_router()
                + Self::search_router(),
        }
    }

    pub fn from_settings(github: GithubClient, settings: &Settings) -> Self {
        Self::new(
            github,
            Arc::new(settings.repo_scope()),
            settings.server_name.clone(),
            settings.max_results,
        )
    }

    pub fn name(&self) -> &str {
        &self.server_name
    }

    pub fn scope(&self) -> &RepoScope {
        &self.scope
    }

    /// Resolve the target repository (defaults, placeholders, allow-list)
    /// and make sure both names are safe to put in a route.
    fn repo(&self, owner: Option<&str>, repo: Option<&str>) -> Result<RepoRef, McpGithubError> {
        let repo_ref = self.scope.resolve(owner, repo)?;
        sanitize_github_name(&repo_ref.owner, "owner")?;
        sanitize_github_name(&repo_ref.repo, "repo")?;
        Ok(repo_ref)
    }

    /// Cap per_page to 100 (GitHub API maximum).
    fn capped_per_page(&self, per_page: Option<u32>) -> u32 {
        per_page.unwrap_or(self.max_results).clamp(1, 100)
    }

    fn page_query(&self, per_page: Option<u32>, page: Option<u32>) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", self.capped_per_page(per_page).to_string()),
            ("page", page.unwrap_or(1).max(1).to_string()),
        ]
    }
}

/// Serialize a tool payload as pretty JSON text content.
fn json_result(value: Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    CallToolResult::success(vec![Content::text(text)])
}

/// Copy the named top-level fields of a GitHub object, `null` when missing.
fn pick(value: &Value, fields: &[&str]) -> Value {
    let map = fields
        .iter()
        .map(|&f| (f.to_string(), value.get(f).cloned().unwrap_or(Value::Null)))
        .collect();
    Value::Object(map)
}

/// Elements of a JSON array (or of `value[key]` when a key is given).
fn items<'a>(value: &'a Value, key: Option<&str>) -> &'a [Value] {
    let target = match key {
        Some(key) => value.get(key),
        None => Some(value),
    };
    target
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn at(value: &Value, pointer: &str) -> Value {
    value.pointer(pointer).cloned().unwrap_or(Value::Null)
}

fn first_line(value: &Value, pointer: &str) -> Value {
    match value.pointer(pointer).and_then(Value::as_str) {
        Some(message) => Value::from(message.lines().next().unwrap_or_default()),
        None => Value::Null,
    }
}

fn short_sha(value: &Value, pointer: &str) -> Value {
    match value.pointer(pointer).and_then(Value::as_str) {
        Some(sha) => Value::from(sha.chars().take(7).collect::<String>()),
        None => Value::Null,
    }
}

/// Names of a `labels` array or logins of an `assignees` array.
fn names(value: &Value, key: &str, field: &str) -> Vec<Value> {
    items(value, Some(key))
        .iter()
        .map(|item| item.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Split a comma-separated tool argument, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn check_choice(value: &str, field: &str, allowed: &[&str]) -> Result<(), McpGithubError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(McpGithubError::InvalidParam(format!(
            "{} must be one of: {}",
            field,
            allowed.join(", ")
        )))
    }
}

#[tool_handler]
impl ServerHandler for McpGithubServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: self.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "GitHub server. Most tools act on a repository: pass owner and repo, or omit \
                 them to use the configured default (set_default_repo changes it at runtime). \
                 Tool groups: repositories, files, branches and commits, issues, pull requests, \
                 GitHub Actions, users, gists and search. The github://user resource describes \
                 the authenticated account."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let mut resource = RawResource::new(USER_RESOURCE_URI, "GitHub user");
        resource.description = Some("The account behind the configured GitHub token".to_string());
        resource.mime_type = Some("text/markdown".to_string());
        Ok(ListResourcesResult::with_all_items(vec![
            resource.no_annotation()
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        if request.uri != USER_RESOURCE_URI {
            return Err(ErrorData::resource_not_found(
                format!("Unknown resource: {}", request.uri),
                None,
            ));
        }
        self.github.require_auth()?;
        let user = self.github.get("/user", &[]).await?;
        let text = format!(
            "# GitHub User: {}\nURL: {}",
            user.get("login").and_then(Value::as_str).unwrap_or("unknown"),
            user.get("html_url").and_then(Value::as_str).unwrap_or(""),
        );
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, USER_RESOURCE_URI)],
        })
    }
}
