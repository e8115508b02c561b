use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{at, check_choice, first_line, items, json_result, McpGithubServer};
use crate::error::McpGithubError;

const PATCH_PREVIEW_CHARS: usize = 500;
const PR_STATES: &[&str] = &["open", "closed"];
const PR_LIST_STATES: &[&str] = &["open", "closed", "all"];
const MERGE_METHODS: &[&str] = &["merge", "squash", "rebase"];
const REVIEW_EVENTS: &[&str] = &["APPROVE", "REQUEST_CHANGES", "COMMENT"];

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListPullRequestsParams {
    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Filter by state: open, closed, all (default: open)")]
    #[serde(default)]
    pub state: Option<String>,

    #[schemars(description = "Filter by head branch, as user:branch or org:branch")]
    #[serde(default)]
    pub head: Option<String>,

    #[schemars(description = "Filter by base branch")]
    #[serde(default)]
    pub base: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PullNumberParams {
    #[schemars(description = "Pull request number")]
    pub pull_number: u64,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PullPageParams {
    #[schemars(description = "Pull request number")]
    pub pull_number: u64,

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

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreatePullRequestParams {
    #[schemars(description = "Pull request title")]
    pub title: String,

    #[schemars(description = "Branch containing the changes")]
    pub head: String,

    #[schemars(description = "Branch to merge into (default: main)")]
    #[serde(default)]
    pub base: Option<String>,

    #[schemars(description = "Pull request description (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "Open as a draft (default: false)")]
    #[serde(default)]
    pub draft: Option<bool>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdatePullRequestParams {
    #[schemars(description = "Pull request number")]
    pub pull_number: u64,

    #[schemars(description = "New title")]
    #[serde(default)]
    pub title: Option<String>,

    #[schemars(description = "New description (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "New state: open or closed")]
    #[serde(default)]
    pub state: Option<String>,

    #[schemars(description = "New base branch")]
    #[serde(default)]
    pub base: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MergePullRequestParams {
    #[schemars(description = "Pull request number")]
    pub pull_number: u64,

    #[schemars(description = "Title for the merge commit")]
    #[serde(default)]
    pub commit_title: Option<String>,

    #[schemars(description = "Extra detail for the merge commit")]
    #[serde(default)]
    pub commit_message: Option<String>,

    #[schemars(description = "Merge method: merge, squash, rebase (default: merge)")]
    #[serde(default)]
    pub merge_method: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateReviewParams {
    #[schemars(description = "Pull request number")]
    pub pull_number: u64,

    #[schemars(description = "Review comment (Markdown)")]
    pub body: String,

    #[schemars(description = "Review action: APPROVE, REQUEST_CHANGES, COMMENT (default: COMMENT)")]
    #[serde(default)]
    pub event: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

/// Cut a diff to a preview length, marking the cut with `...`.
fn truncate_patch(patch: &str) -> String {
    if patch.chars().count() <= PATCH_PREVIEW_CHARS {
        return patch.to_string();
    }
    let mut preview: String = patch.chars().take(PATCH_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

fn summarize_pull(pr: &Value) -> Value {
    json!({
        "number": pr.get("number"),
        "title": pr.get("title"),
        "state": pr.get("state"),
        "html_url": pr.get("html_url"),
        "author": at(pr, "/user/login"),
        "head": at(pr, "/head/ref"),
        "base": at(pr, "/base/ref"),
        "draft": pr.get("draft"),
        "mergeable": pr.get("mergeable"),
        "created_at": pr.get("created_at"),
        "updated_at": pr.get("updated_at"),
    })
}

fn summarize_pr_file(f: &Value) -> Value {
    let patch = f.get("patch").and_then(Value::as_str).map(truncate_patch);
    json!({
        "filename": f.get("filename"),
        "status": f.get("status"),
        "additions": f.get("additions"),
        "deletions": f.get("deletions"),
        "changes": f.get("changes"),
        "patch": patch,
    })
}

fn pull_patch(params: &UpdatePullRequestParams) -> Result<Value, McpGithubError> {
    let mut body = Map::new();
    if let Some(title) = &params.title {
        body.insert("title".to_string(), json!(title));
    }
    if let Some(text) = &params.body {
        body.insert("body".to_string(), json!(text));
    }
    if let Some(state) = &params.state {
        check_choice(state, "state", PR_STATES)?;
        body.insert("state".to_string(), json!(state));
    }
    if let Some(base) = &params.base {
        body.insert("base".to_string(), json!(base));
    }
    if body.is_empty() {
        return Err(McpGithubError::MissingParam(
            "nothing to update: pass at least one of title, body, state, base".to_string(),
        ));
    }
    Ok(Value::Object(body))
}

#[tool_router(router = pull_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "list_pull_requests",
        description = "List pull requests, optionally filtered by state, head and base branch"
    )]
    pub async fn list_pull_requests(
        &self,
        Parameters(params): Parameters<ListPullRequestsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let state = params.state.unwrap_or_else(|| "open".to_string());
        check_choice(&state, "state", PR_LIST_STATES)?;

        let mut query = self.page_query(params.per_page, params.page);
        query.push(("state", state));
        if let Some(head) = params.head.filter(|h| !h.is_empty()) {
            query.push(("head", head));
        }
        if let Some(base) = params.base.filter(|b| !b.is_empty()) {
            query.push(("base", base));
        }

        let response = self
            .github
            .get(&format!("{}/pulls", repo.route()), &query)
            .await?;
        let pulls: Vec<Value> = items(&response, None).iter().map(summarize_pull).collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "pull_requests": pulls,
            "count": pulls.len(),
        })))
    }

    #[tool(
        name = "get_pull_request",
        description = "Get a pull request with merge status and change counts"
    )]
    pub async fn get_pull_request(
        &self,
        Parameters(params): Parameters<PullNumberParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let r = self
            .github
            .get(&format!("{}/pulls/{}", repo.route(), params.pull_number), &[])
            .await?;

        Ok(json_result(json!({
            "number": r.get("number"),
            "title": r.get("title"),
            "body": r.get("body"),
            "state": r.get("state"),
            "html_url": r.get("html_url"),
            "author": at(&r, "/user/login"),
            "head": at(&r, "/head/ref"),
            "base": at(&r, "/base/ref"),
            "draft": r.get("draft"),
            "mergeable": r.get("mergeable"),
            "mergeable_state": r.get("mergeable_state"),
            "merged": r.get("merged"),
            "merged_by": at(&r, "/merged_by/login"),
            "commits": r.get("commits"),
            "additions": r.get("additions"),
            "deletions": r.get("deletions"),
            "changed_files": r.get("changed_files"),
            "created_at": r.get("created_at"),
            "updated_at": r.get("updated_at"),
            "merged_at": r.get("merged_at"),
        })))
    }

    #[tool(name = "create_pull_request", description = "Open a pull request")]
    pub async fn create_pull_request(
        &self,
        Parameters(params): Parameters<CreatePullRequestParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let body = json!({
            "title": params.title,
            "head": params.head,
            "base": params.base.unwrap_or_else(|| "main".to_string()),
            "body": params.body.unwrap_or_default(),
            "draft": params.draft.unwrap_or(false),
        });

        let r = self
            .github
            .post(&format!("{}/pulls", repo.route()), &body)
            .await?;
        tracing::info!(repo = %repo.full_name(), number = ?r.get("number"), "Created pull request");

        Ok(json_result(json!({
            "status": "success",
            "number": r.get("number"),
            "title": r.get("title"),
            "html_url": r.get("html_url"),
            "state": r.get("state"),
        })))
    }

    #[tool(
        name = "update_pull_request",
        description = "Update a pull request's title, body, state or base branch"
    )]
    pub async fn update_pull_request(
        &self,
        Parameters(params): Parameters<UpdatePullRequestParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let body = pull_patch(&params)?;

        let r = self
            .github
            .patch(&format!("{}/pulls/{}", repo.route(), params.pull_number), &body)
            .await?;

        Ok(json_result(json!({
            "status": "success",
            "number": r.get("number"),
            "title": r.get("title"),
            "state": r.get("state"),
            "html_url": r.get("html_url"),
        })))
    }

    #[tool(
        name = "merge_pull_request",
        description = "Merge a pull request using merge, squash or rebase"
    )]
    pub async fn merge_pull_request(
        &self,
        Parameters(params): Parameters<MergePullRequestParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let method = params.merge_method.unwrap_or_else(|| "merge".to_string());
        check_choice(&method, "merge_method", MERGE_METHODS)?;
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;

        let mut body = json!({"merge_method": method});
        if let Some(title) = params.commit_title.filter(|t| !t.is_empty()) {
            body["commit_title"] = json!(title);
        }
        if let Some(message) = params.commit_message.filter(|m| !m.is_empty()) {
            body["commit_message"] = json!(message);
        }

        let route = format!("{}/pulls/{}/merge", repo.route(), params.pull_number);
        let r = self.github.put(&route, &body).await?;
        tracing::info!(repo = %repo.full_name(), number = params.pull_number, method = %method, "Merged pull request");

        Ok(json_result(json!({
            "status": "success",
            "merged": r.get("merged"),
            "message": r.get("message"),
            "sha": r.get("sha"),
        })))
    }

    #[tool(name = "list_pr_commits", description = "List the commits of a pull request")]
    pub async fn list_pr_commits(
        &self,
        Parameters(params): Parameters<PullPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let route = format!("{}/pulls/{}/commits", repo.route(), params.pull_number);
        let response = self.github.get(&route, &query).await?;
        let commits: Vec<Value> = items(&response, None)
            .iter()
            .map(|c| {
                json!({
                    "sha": c.get("sha"),
                    "message": first_line(c, "/commit/message"),
                    "author": at(c, "/commit/author/name"),
                    "date": at(c, "/commit/author/date"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "pull_number": params.pull_number,
            "commits": commits,
            "count": commits.len(),
        })))
    }

    #[tool(
        name = "list_pr_files",
        description = "List files changed in a pull request with a short diff preview"
    )]
    pub async fn list_pr_files(
        &self,
        Parameters(params): Parameters<PullPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let route = format!("{}/pulls/{}/files", repo.route(), params.pull_number);
        let response = self.github.get(&route, &query).await?;
        let files: Vec<Value> = items(&response, None).iter().map(summarize_pr_file).collect();

        Ok(json_result(json!({
            "pull_number": params.pull_number,
            "files": files,
            "count": files.len(),
        })))
    }

    #[tool(
        name = "create_pr_review",
        description = "Submit a review on a pull request: APPROVE, REQUEST_CHANGES or COMMENT"
    )]
    pub async fn create_pr_review(
        &self,
        Parameters(params): Parameters<CreateReviewParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let event = params.event.unwrap_or_else(|| "COMMENT".to_string());
        check_choice(&event, "event", REVIEW_EVENTS)?;
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;

        let route = format!("{}/pulls/{}/reviews", repo.route(), params.pull_number);
        let r = self
            .github
            .post(&route, &json!({"body": params.body, "event": event}))
            .await?;

        Ok(json_result(json!({
            "status": "success",
            "id": r.get("id"),
            "state": r.get("state"),
            "html_url": r.get("html_url"),
        })))
    }

    #[tool(
        name = "list_pr_comments",
        description = "List review comments left on the diff of a pull request"
    )]
    pub async fn list_pr_comments(
        &self,
        Parameters(params): Parameters<PullPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let route = format!("{}/pulls/{}/comments", repo.route(), params.pull_number);
        let response = self.github.get(&route, &query).await?;
        let comments: Vec<Value> = items(&response, None)
            .iter()
            .map(|c| {
                json!({
                    "id": c.get("id"),
                    "body": c.get("body"),
                    "path": c.get("path"),
                    "author": at(c, "/user/login"),
                    "created_at": c.get("created_at"),
                    "html_url": c.get("html_url"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "pull_number": params.pull_number,
            "comments": comments,
            "count": comments.len(),
        })))
    }
}
