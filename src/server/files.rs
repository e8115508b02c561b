use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{at, items, json_result, pick, McpGithubServer};
use crate::config::RepoRef;
use crate::error::McpGithubError;
use crate::github::{decode_content, encode_content, encode_path, sanitize_url_value};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FileContentsParams {
    #[schemars(description = "File path within the repository")]
    pub path: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Git ref (branch, tag, or SHA). Defaults to the repo's default branch")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct DirectoryContentsParams {
    #[schemars(description = "Directory path (empty for the repository root)")]
    #[serde(default)]
    pub path: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Git ref (branch, tag, or SHA). Defaults to the repo's default branch")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WriteFileParams {
    #[schemars(description = "File path within the repository")]
    pub path: String,

    #[schemars(description = "New file content (plain text)")]
    pub content: String,

    #[schemars(description = "Commit message")]
    pub message: String,

    #[schemars(description = "Blob SHA of the file being replaced (required when updating; get it from get_file_content)")]
    #[serde(default)]
    pub sha: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Branch to commit to (default: the repo's default branch)")]
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteFileParams {
    #[schemars(description = "File path within the repository")]
    pub path: String,

    #[schemars(description = "Commit message")]
    pub message: String,

    #[schemars(description = "Blob SHA of the file (get it from get_file_content)")]
    pub sha: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Branch to commit to (default: the repo's default branch)")]
    #[serde(default)]
    pub branch: Option<String>,
}

fn contents_route(repo: &RepoRef, path: &str) -> Result<String, McpGithubError> {
    let path = path.trim().trim_matches('/');
    if path.is_empty() {
        return Ok(format!("{}/contents", repo.route()));
    }
    Ok(format!("{}/contents/{}", repo.route(), encode_path(path, "path")?))
}

fn ref_query(git_ref: Option<&str>) -> Result<Vec<(&'static str, String)>, McpGithubError> {
    match git_ref.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => {
            sanitize_url_value(r, "ref")?;
            Ok(vec![("ref", r.to_string())])
        }
        None => Ok(Vec::new()),
    }
}

/// The commit/content summary GitHub returns for contents-API writes.
fn summarize_write(r: &Value) -> Value {
    json!({
        "status": "success",
        "path": at(r, "/content/path"),
        "sha": at(r, "/content/sha"),
        "html_url": at(r, "/content/html_url"),
        "commit_sha": at(r, "/commit/sha"),
        "commit_message": at(r, "/commit/message"),
    })
}

#[tool_router(router = file_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "get_file_content",
        description = "Read a file from a repository at an optional ref; content is returned decoded"
    )]
    pub async fn get_file_content(
        &self,
        Parameters(params): Parameters<FileContentsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        if params.path.trim().trim_matches('/').is_empty() {
            return Err(McpGithubError::MissingParam("path must not be empty".to_string()).into());
        }
        let route = contents_route(&repo, &params.path)?;
        let query = ref_query(params.git_ref.as_deref())?;

        let response = self.github.get(&route, &query).await?;
        if response.is_array() {
            return Err(McpGithubError::InvalidParam(format!(
                "{} is a directory, use get_directory_content",
                params.path
            ))
            .into());
        }

        let mut out = pick(
            &response,
            &["name", "path", "sha", "size", "encoding", "html_url", "download_url"],
        );
        let raw = response.get("content").and_then(Value::as_str);
        match raw {
            Some(raw) if response.get("encoding").and_then(Value::as_str) == Some("base64") => {
                out["content"] = json!(decode_content(raw));
                out["encoding"] = json!("utf-8");
            }
            Some(raw) => out["content"] = json!(raw),
            None => out["content"] = Value::Null,
        }
        Ok(json_result(out))
    }

    #[tool(
        name = "get_directory_content",
        description = "List the entries of a directory in a repository"
    )]
    pub async fn get_directory_content(
        &self,
        Parameters(params): Parameters<DirectoryContentsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let path = params.path.unwrap_or_default();
        let route = contents_route(&repo, &path)?;
        let query = ref_query(params.git_ref.as_deref())?;

        let response = self.github.get(&route, &query).await?;
        if !response.is_array() {
            return Err(McpGithubError::InvalidParam(format!(
                "{} is a file, use get_file_content",
                path
            ))
            .into());
        }

        let entries: Vec<Value> = items(&response, None)
            .iter()
            .map(|e| pick(e, &["name", "path", "type", "size", "sha", "html_url"]))
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "path": path,
            "entries": entries,
            "count": entries.len(),
        })))
    }

    #[tool(
        name = "create_file",
        description = "Create a new file in a repository with a commit"
    )]
    pub async fn create_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = contents_route(&repo, &params.path)?;

        let mut body = json!({
            "message": params.message,
            "content": encode_content(&params.content),
        });
        if let Some(branch) = params.branch {
            body["branch"] = json!(branch);
        }

        let r = self.github.put(&route, &body).await?;
        tracing::info!(repo = %repo.full_name(), path = %params.path, "Created file");
        Ok(json_result(summarize_write(&r)))
    }

    #[tool(
        name = "update_file",
        description = "Replace the content of an existing file; requires its current blob SHA"
    )]
    pub async fn update_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = contents_route(&repo, &params.path)?;
        let sha = params
            .sha
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| McpGithubError::MissingParam("sha is required to update a file".to_string()))?;

        let mut body = json!({
            "message": params.message,
            "content": encode_content(&params.content),
            "sha": sha,
        });
        if let Some(branch) = params.branch {
            body["branch"] = json!(branch);
        }

        let r = self.github.put(&route, &body).await?;
        tracing::info!(repo = %repo.full_name(), path = %params.path, "Updated file");
        Ok(json_result(summarize_write(&r)))
    }

    #[tool(
        name = "delete_file",
        description = "Delete a file from a repository with a commit; requires its current blob SHA"
    )]
    pub async fn delete_file(
        &self,
        Parameters(params): Parameters<DeleteFileParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = contents_route(&repo, &params.path)?;

        let mut body = json!({
            "message": params.message,
            "sha": params.sha,
        });
        if let Some(branch) = params.branch {
            body["branch"] = json!(branch);
        }

        let r = self.github.delete(&route, &body).await?;
        tracing::info!(repo = %repo.full_name(), path = %params.path, "Deleted file");
        Ok(json_result(json!({
            "status": "success",
            "message": format!("File {} deleted", params.path),
            "commit_sha": at(&r, "/commit/sha"),
        })))
    }
}
