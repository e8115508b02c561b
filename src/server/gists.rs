use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{at, items, json_result, pick, McpGithubServer};
use crate::error::McpGithubError;
use crate::github::sanitize_github_name;

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListGistsParams {
    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GistIdParams {
    #[schemars(description = "Gist id")]
    pub gist_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateGistParams {
    #[schemars(description = "File name, e.g. notes.md")]
    pub filename: String,

    #[schemars(description = "File content")]
    pub content: String,

    #[schemars(description = "Gist description")]
    #[serde(default)]
    pub description: Option<String>,

    #[schemars(description = "Make the gist public (default: false, secret)")]
    #[serde(default)]
    pub public: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateMultiFileGistParams {
    #[schemars(description = "Files as a JSON object string: {\"a.py\": {\"content\": \"...\"}, \"b.md\": {\"content\": \"...\"}}")]
    pub files_json: String,

    #[schemars(description = "Gist description")]
    #[serde(default)]
    pub description: Option<String>,

    #[schemars(description = "Make the gist public (default: false, secret)")]
    #[serde(default)]
    pub public: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateGistParams {
    #[schemars(description = "Gist id")]
    pub gist_id: String,

    #[schemars(description = "File to create or replace (used together with content)")]
    #[serde(default)]
    pub filename: Option<String>,

    #[schemars(description = "New content for filename")]
    #[serde(default)]
    pub content: Option<String>,

    #[schemars(description = "New gist description")]
    #[serde(default)]
    pub description: Option<String>,
}

fn file_names(gist: &Value) -> Vec<String> {
    gist.get("files")
        .and_then(Value::as_object)
        .map(|files| files.keys().cloned().collect())
        .unwrap_or_default()
}

/// Validate a `{"name": {"content": "..."}}` files object for the gists API.
fn parse_gist_files(raw: &str) -> Result<Map<String, Value>, McpGithubError> {
    let files = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(files)) => files,
        Ok(_) => {
            return Err(McpGithubError::InvalidParam(
                "files_json must be a JSON object keyed by file name".to_string(),
            ))
        }
        Err(e) => {
            return Err(McpGithubError::InvalidParam(format!(
                "files_json is not valid JSON: {}",
                e
            )))
        }
    };
    if files.is_empty() {
        return Err(McpGithubError::MissingParam(
            "files_json must contain at least one file".to_string(),
        ));
    }
    for (name, file) in &files {
        if file.get("content").and_then(Value::as_str).is_none() {
            return Err(McpGithubError::InvalidParam(format!(
                "file {} needs a string \"content\" field",
                name
            )));
        }
    }
    Ok(files)
}

fn gist_update_body(params: &UpdateGistParams) -> Result<Value, McpGithubError> {
    let mut body = Map::new();
    if let Some(description) = &params.description {
        body.insert("description".to_string(), json!(description));
    }
    // a file is only touched when both its name and content are given
    if let (Some(filename), Some(content)) = (&params.filename, &params.content) {
        if !filename.is_empty() {
            body.insert(
                "files".to_string(),
                json!({ filename.as_str(): {"content": content} }),
            );
        }
    }
    if body.is_empty() {
        return Err(McpGithubError::MissingParam(
            "nothing to update: pass description, or filename together with content".to_string(),
        ));
    }
    Ok(Value::Object(body))
}

#[tool_router(router = gist_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(name = "list_gists", description = "List gists of the authenticated user")]
    pub async fn list_gists(
        &self,
        Parameters(params): Parameters<ListGistsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.github.require_auth()?;
        let query = self.page_query(params.per_page, params.page);
        let response = self.github.get("/gists", &query).await?;

        let gists: Vec<Value> = items(&response, None)
            .iter()
            .map(|g| {
                json!({
                    "id": g.get("id"),
                    "description": g.get("description"),
                    "html_url": g.get("html_url"),
                    "public": g.get("public"),
                    "files": file_names(g),
                    "comments": g.get("comments"),
                    "created_at": g.get("created_at"),
                    "updated_at": g.get("updated_at"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "gists": gists,
            "count": gists.len(),
        })))
    }

    #[tool(name = "get_gist", description = "Get a gist with the content of its files")]
    pub async fn get_gist(
        &self,
        Parameters(params): Parameters<GistIdParams>,
    ) -> Result<CallToolResult, ErrorData> {
        sanitize_github_name(&params.gist_id, "gist_id")?;
        let r = self
            .github
            .get(&format!("/gists/{}", params.gist_id), &[])
            .await?;

        let files: Map<String, Value> = r
            .get("files")
            .and_then(Value::as_object)
            .map(|files| {
                files
                    .iter()
                    .map(|(name, f)| {
                        (
                            name.clone(),
                            pick(f, &["filename", "type", "language", "size", "content"]),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json_result(json!({
            "id": r.get("id"),
            "description": r.get("description"),
            "html_url": r.get("html_url"),
            "public": r.get("public"),
            "files": files,
            "owner": at(&r, "/owner/login"),
            "comments": r.get("comments"),
            "created_at": r.get("created_at"),
            "updated_at": r.get("updated_at"),
        })))
    }

    #[tool(name = "create_gist", description = "Create a single-file gist")]
    pub async fn create_gist(
        &self,
        Parameters(params): Parameters<CreateGistParams>,
    ) -> Result<CallToolResult, ErrorData> {
        if params.filename.trim().is_empty() {
            return Err(McpGithubError::MissingParam("filename must not be empty".to_string()).into());
        }
        let body = json!({
            "description": params.description.unwrap_or_default(),
            "public": params.public.unwrap_or(false),
            "files": { params.filename.as_str(): {"content": params.content} },
        });

        self.github.require_auth()?;
        let r = self.github.post("/gists", &body).await?;
        tracing::info!(id = ?r.get("id"), "Created gist");

        Ok(json_result(json!({
            "status": "success",
            "id": r.get("id"),
            "html_url": r.get("html_url"),
            "public": r.get("public"),
        })))
    }

    #[tool(
        name = "create_multi_file_gist",
        description = "Create a gist with several files given as a JSON object string"
    )]
    pub async fn create_multi_file_gist(
        &self,
        Parameters(params): Parameters<CreateMultiFileGistParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let files = parse_gist_files(&params.files_json)?;
        let body = json!({
            "description": params.description.unwrap_or_default(),
            "public": params.public.unwrap_or(false),
            "files": files,
        });

        self.github.require_auth()?;
        let r = self.github.post("/gists", &body).await?;
        tracing::info!(id = ?r.get("id"), "Created gist");

        Ok(json_result(json!({
            "status": "success",
            "id": r.get("id"),
            "html_url": r.get("html_url"),
            "public": r.get("public"),
            "files": file_names(&r),
        })))
    }

    #[tool(
        name = "update_gist",
        description = "Change a gist's description and/or create or replace one of its files"
    )]
    pub async fn update_gist(
        &self,
        Parameters(params): Parameters<UpdateGistParams>,
    ) -> Result<CallToolResult, ErrorData> {
        sanitize_github_name(&params.gist_id, "gist_id")?;
        let body = gist_update_body(&params)?;

        let r = self
            .github
            .patch(&format!("/gists/{}", params.gist_id), &body)
            .await?;

        Ok(json_result(json!({
            "status": "success",
            "id": r.get("id"),
            "html_url": r.get("html_url"),
            "files": file_names(&r),
        })))
    }

    #[tool(name = "delete_gist", description = "Delete a gist")]
    pub async fn delete_gist(
        &self,
        Parameters(params): Parameters<GistIdParams>,
    ) -> Result<CallToolResult, ErrorData> {
        sanitize_github_name(&params.gist_id, "gist_id")?;
        self.github
            .delete_no_content(&format!("/gists/{}", params.gist_id))
            .await?;
        tracing::info!(id = %params.gist_id, "Deleted gist");

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Gist {} deleted", params.gist_id),
        })))
    }
}
