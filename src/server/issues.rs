use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{at, check_choice, items, json_result, names, split_list, McpGithubServer, RepoParams};
use crate::error::McpGithubError;

const ISSUE_STATES: &[&str] = &["open", "closed"];
const ISSUE_LIST_STATES: &[&str] = &["open", "closed", "all"];

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListIssuesParams {
    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Filter by state: open, closed, all (default: open)")]
    #[serde(default)]
    pub state: Option<String>,

    #[schemars(description = "Comma-separated label names; issues must have all of them")]
    #[serde(default)]
    pub labels: Option<String>,

    #[schemars(description = "Filter by assignee login")]
    #[serde(default)]
    pub assignee: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IssueNumberParams {
    #[schemars(description = "Issue number")]
    pub issue_number: u64,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateIssueParams {
    #[schemars(description = "Issue title")]
    pub title: String,

    #[schemars(description = "Issue body (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "Comma-separated label names")]
    #[serde(default)]
    pub labels: Option<String>,

    #[schemars(description = "Comma-separated assignee logins")]
    #[serde(default)]
    pub assignees: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateIssueParams {
    #[schemars(description = "Issue number")]
    pub issue_number: u64,

    #[schemars(description = "New title")]
    #[serde(default)]
    pub title: Option<String>,

    #[schemars(description = "New body (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "New state: open or closed")]
    #[serde(default)]
    pub state: Option<String>,

    #[schemars(description = "Comma-separated label names; replaces the current labels")]
    #[serde(default)]
    pub labels: Option<String>,

    #[schemars(description = "Comma-separated assignee logins; replaces the current assignees")]
    #[serde(default)]
    pub assignees: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IssueCommentsParams {
    #[schemars(description = "Issue or pull request number")]
    pub issue_number: u64,

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
pub struct CreateIssueCommentParams {
    #[schemars(description = "Issue or pull request number")]
    pub issue_number: u64,

    #[schemars(description = "Comment body (Markdown)")]
    pub body: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddLabelsParams {
    #[schemars(description = "Issue or pull request number")]
    pub issue_number: u64,

    #[schemars(description = "Comma-separated label names to add")]
    pub labels: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

/// The issues API also returns pull requests; those carry a `pull_request` key.
pub(super) fn is_pull_request(item: &Value) -> bool {
    item.get("pull_request").is_some_and(|pr| !pr.is_null())
}

fn summarize_issue(i: &Value) -> Value {
    json!({
        "number": i.get("number"),
        "title": i.get("title"),
        "state": i.get("state"),
        "html_url": i.get("html_url"),
        "author": at(i, "/user/login"),
        "labels": names(i, "labels", "name"),
        "assignees": names(i, "assignees", "login"),
        "comments": i.get("comments"),
        "created_at": i.get("created_at"),
        "updated_at": i.get("updated_at"),
    })
}

fn summarize_comment(c: &Value) -> Value {
    json!({
        "id": c.get("id"),
        "body": c.get("body"),
        "author": at(c, "/user/login"),
        "created_at": c.get("created_at"),
        "updated_at": c.get("updated_at"),
        "html_url": c.get("html_url"),
    })
}

/// Build an issue PATCH body from the fields that were actually given.
fn issue_patch(params: &UpdateIssueParams) -> Result<Value, McpGithubError> {
    let mut body = Map::new();
    if let Some(title) = &params.title {
        body.insert("title".to_string(), json!(title));
    }
    if let Some(text) = &params.body {
        body.insert("body".to_string(), json!(text));
    }
    if let Some(state) = &params.state {
        check_choice(state, "state", ISSUE_STATES)?;
        body.insert("state".to_string(), json!(state));
    }
    if let Some(labels) = &params.labels {
        body.insert("labels".to_string(), json!(split_list(labels)));
    }
    if let Some(assignees) = &params.assignees {
        body.insert("assignees".to_string(), json!(split_list(assignees)));
    }
    if body.is_empty() {
        return Err(McpGithubError::MissingParam(
            "nothing to update: pass at least one of title, body, state, labels, assignees"
                .to_string(),
        ));
    }
    Ok(Value::Object(body))
}

#[tool_router(router = issue_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "list_issues",
        description = "List issues of a repository (pull requests are excluded)"
    )]
    pub async fn list_issues(
        &self,
        Parameters(params): Parameters<ListIssuesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let state = params.state.unwrap_or_else(|| "open".to_string());
        check_choice(&state, "state", ISSUE_LIST_STATES)?;

        let mut query = self.page_query(params.per_page, params.page);
        query.push(("state", state));
        if let Some(labels) = params.labels.filter(|l| !l.is_empty()) {
            query.push(("labels", labels));
        }
        if let Some(assignee) = params.assignee.filter(|a| !a.is_empty()) {
            query.push(("assignee", assignee));
        }

        let response = self
            .github
            .get(&format!("{}/issues", repo.route()), &query)
            .await?;
        let issues: Vec<Value> = items(&response, None)
            .iter()
            .filter(|i| !is_pull_request(i))
            .map(summarize_issue)
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "issues": issues,
            "count": issues.len(),
        })))
    }

    #[tool(
        name = "get_issue",
        description = "Get an issue with its body, labels, assignees and milestone"
    )]
    pub async fn get_issue(
        &self,
        Parameters(params): Parameters<IssueNumberParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let r = self
            .github
            .get(&format!("{}/issues/{}", repo.route(), params.issue_number), &[])
            .await?;

        Ok(json_result(json!({
            "number": r.get("number"),
            "title": r.get("title"),
            "body": r.get("body"),
            "state": r.get("state"),
            "html_url": r.get("html_url"),
            "author": at(&r, "/user/login"),
            "labels": names(&r, "labels", "name"),
            "assignees": names(&r, "assignees", "login"),
            "milestone": at(&r, "/milestone/title"),
            "comments": r.get("comments"),
            "created_at": r.get("created_at"),
            "updated_at": r.get("updated_at"),
            "closed_at": r.get("closed_at"),
        })))
    }

    #[tool(name = "create_issue", description = "Open a new issue")]
    pub async fn create_issue(
        &self,
        Parameters(params): Parameters<CreateIssueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;

        let mut body = json!({
            "title": params.title,
            "body": params.body.unwrap_or_default(),
        });
        if let Some(labels) = params.labels.as_deref().map(split_list).filter(|l| !l.is_empty()) {
            body["labels"] = json!(labels);
        }
        if let Some(assignees) = params
            .assignees
            .as_deref()
            .map(split_list)
            .filter(|a| !a.is_empty())
        {
            body["assignees"] = json!(assignees);
        }

        let r = self
            .github
            .post(&format!("{}/issues", repo.route()), &body)
            .await?;
        tracing::info!(repo = %repo.full_name(), number = ?r.get("number"), "Created issue");

        Ok(json_result(json!({
            "status": "success",
            "number": r.get("number"),
            "title": r.get("title"),
            "html_url": r.get("html_url"),
        })))
    }

    #[tool(
        name = "update_issue",
        description = "Update an issue's title, body, state, labels or assignees"
    )]
    pub async fn update_issue(
        &self,
        Parameters(params): Parameters<UpdateIssueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let body = issue_patch(&params)?;

        let r = self
            .github
            .patch(&format!("{}/issues/{}", repo.route(), params.issue_number), &body)
            .await?;

        Ok(json_result(json!({
            "status": "success",
            "number": r.get("number"),
            "title": r.get("title"),
            "state": r.get("state"),
            "html_url": r.get("html_url"),
        })))
    }

    #[tool(name = "close_issue", description = "Close an issue")]
    pub async fn close_issue(
        &self,
        Parameters(params): Parameters<IssueNumberParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let r = self
            .github
            .patch(
                &format!("{}/issues/{}", repo.route(), params.issue_number),
                &json!({"state": "closed"}),
            )
            .await?;

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Issue #{} closed", params.issue_number),
            "html_url": r.get("html_url"),
        })))
    }

    #[tool(
        name = "list_issue_comments",
        description = "List comments on an issue or pull request conversation"
    )]
    pub async fn list_issue_comments(
        &self,
        Parameters(params): Parameters<IssueCommentsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let route = format!("{}/issues/{}/comments", repo.route(), params.issue_number);
        let response = self.github.get(&route, &query).await?;
        let comments: Vec<Value> = items(&response, None).iter().map(summarize_comment).collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "issue_number": params.issue_number,
            "comments": comments,
            "count": comments.len(),
        })))
    }

    #[tool(
        name = "create_issue_comment",
        description = "Comment on an issue or pull request conversation"
    )]
    pub async fn create_issue_comment(
        &self,
        Parameters(params): Parameters<CreateIssueCommentParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = format!("{}/issues/{}/comments", repo.route(), params.issue_number);
        let r = self
            .github
            .post(&route, &json!({"body": params.body}))
            .await?;

        Ok(json_result(json!({
            "status": "success",
            "id": r.get("id"),
            "html_url": r.get("html_url"),
        })))
    }

    #[tool(name = "list_labels", description = "List the labels defined in a repository")]
    pub async fn list_labels(
        &self,
        Parameters(params): Parameters<RepoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(Some(100), None);

        let response = self
            .github
            .get(&format!("{}/labels", repo.route()), &query)
            .await?;
        let labels: Vec<Value> = items(&response, None)
            .iter()
            .map(|l| {
                json!({
                    "name": l.get("name"),
                    "color": l.get("color"),
                    "description": l.get("description"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "labels": labels,
            "count": labels.len(),
        })))
    }

    #[tool(
        name = "add_labels",
        description = "Add labels to an issue or pull request; returns the resulting label set"
    )]
    pub async fn add_labels(
        &self,
        Parameters(params): Parameters<AddLabelsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let labels = split_list(&params.labels);
        if labels.is_empty() {
            return Err(McpGithubError::MissingParam("labels must not be empty".to_string()).into());
        }

        let route = format!("{}/issues/{}/labels", repo.route(), params.issue_number);
        let r = self.github.post(&route, &json!({"labels": labels})).await?;
        let current: Vec<Value> = items(&r, None)
            .iter()
            .map(|l| l.get("name").cloned().unwrap_or(Value::Null))
            .collect();

        Ok(json_result(json!({
            "status": "success",
            "labels": current,
        })))
    }
}
