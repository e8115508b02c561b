use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{at, first_line, items, json_result, short_sha, McpGithubServer, RepoPageParams};
use crate::error::McpGithubError;
use crate::github::{encode_path, encode_segment, sanitize_url_value};

/// GitHub caps the compare endpoint at 250 commits; the summary keeps the
/// first few so the response stays readable.
const COMPARE_COMMIT_LIMIT: usize = 10;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BranchParams {
    #[schemars(description = "Branch name")]
    pub branch: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateBranchParams {
    #[schemars(description = "Name of the new branch")]
    pub branch: String,

    #[schemars(description = "Existing branch to branch from (default: main)")]
    #[serde(default)]
    pub from_ref: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListCommitsParams {
    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,

    #[schemars(description = "Branch or commit SHA to start listing from")]
    #[serde(default)]
    pub sha: Option<String>,

    #[schemars(description = "Only commits touching this file path")]
    #[serde(default)]
    pub path: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CommitRefParams {
    #[schemars(description = "Commit SHA, branch or tag")]
    #[serde(rename = "ref")]
    pub git_ref: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CompareParams {
    #[schemars(description = "Base branch, tag or SHA")]
    pub base: String,

    #[schemars(description = "Head branch, tag or SHA compared against base")]
    pub head: String,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

fn summarize_commit(c: &Value) -> Value {
    json!({
        "sha": c.get("sha"),
        "message": first_line(c, "/commit/message"),
        "author": at(c, "/commit/author/name"),
        "date": at(c, "/commit/author/date"),
        "html_url": c.get("html_url"),
    })
}

fn summarize_compare(r: &Value) -> Value {
    let commits: Vec<Value> = items(r, Some("commits"))
        .iter()
        .take(COMPARE_COMMIT_LIMIT)
        .map(|c| {
            json!({
                "sha": short_sha(c, "/sha"),
                "message": first_line(c, "/commit/message"),
                "author": at(c, "/commit/author/name"),
            })
        })
        .collect();

    json!({
        "status": r.get("status"),
        "ahead_by": r.get("ahead_by"),
        "behind_by": r.get("behind_by"),
        "total_commits": r.get("total_commits"),
        "html_url": r.get("html_url"),
        "files_changed": items(r, Some("files")).len(),
        "commits": commits,
    })
}

#[tool_router(router = branch_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(name = "list_branches", description = "List branches of a repository")]
    pub async fn list_branches(
        &self,
        Parameters(params): Parameters<RepoPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let response = self
            .github
            .get(&format!("{}/branches", repo.route()), &query)
            .await?;
        let branches: Vec<Value> = items(&response, None)
            .iter()
            .map(|b| {
                json!({
                    "name": b.get("name"),
                    "sha": at(b, "/commit/sha"),
                    "protected": b.get("protected"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "branches": branches,
            "count": branches.len(),
        })))
    }

    #[tool(
        name = "get_branch",
        description = "Get a branch with its head commit and protection status"
    )]
    pub async fn get_branch(
        &self,
        Parameters(params): Parameters<BranchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let branch = encode_segment(&params.branch, "branch")?;

        let r = self
            .github
            .get(&format!("{}/branches/{}", repo.route(), branch), &[])
            .await?;

        Ok(json_result(json!({
            "name": r.get("name"),
            "sha": at(&r, "/commit/sha"),
            "protected": r.get("protected"),
            "commit_message": at(&r, "/commit/commit/message"),
            "commit_author": at(&r, "/commit/commit/author/name"),
            "commit_date": at(&r, "/commit/commit/author/date"),
        })))
    }

    #[tool(
        name = "create_branch",
        description = "Create a branch pointing at the head of an existing branch"
    )]
    pub async fn create_branch(
        &self,
        Parameters(params): Parameters<CreateBranchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let from = params.from_ref.unwrap_or_else(|| "main".to_string());
        sanitize_url_value(&params.branch, "branch")?;
        let from_route = encode_path(&from, "from_ref")?;

        let source = self
            .github
            .get(&format!("{}/git/ref/heads/{}", repo.route(), from_route), &[])
            .await?;
        let sha = source
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| McpGithubError::Other(format!("ref heads/{} has no object sha", from)))?;

        let body = json!({
            "ref": format!("refs/heads/{}", params.branch),
            "sha": sha,
        });
        let r = self
            .github
            .post(&format!("{}/git/refs", repo.route()), &body)
            .await?;
        tracing::info!(repo = %repo.full_name(), branch = %params.branch, from = %from, "Created branch");

        Ok(json_result(json!({
            "status": "success",
            "ref": r.get("ref"),
            "sha": at(&r, "/object/sha"),
            "url": r.get("url"),
        })))
    }

    #[tool(name = "delete_branch", description = "Delete a branch")]
    pub async fn delete_branch(
        &self,
        Parameters(params): Parameters<BranchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let branch = encode_path(&params.branch, "branch")?;

        self.github
            .delete_no_content(&format!("{}/git/refs/heads/{}", repo.route(), branch))
            .await?;
        tracing::info!(repo = %repo.full_name(), branch = %params.branch, "Deleted branch");

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Branch {} deleted", params.branch),
        })))
    }

    #[tool(
        name = "list_commits",
        description = "List commits, optionally starting from a branch/SHA or limited to a file path"
    )]
    pub async fn list_commits(
        &self,
        Parameters(params): Parameters<ListCommitsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let mut query = self.page_query(params.per_page, params.page);
        if let Some(sha) = params.sha.filter(|s| !s.is_empty()) {
            query.push(("sha", sha));
        }
        if let Some(path) = params.path.filter(|p| !p.is_empty()) {
            query.push(("path", path));
        }

        let response = self
            .github
            .get(&format!("{}/commits", repo.route()), &query)
            .await?;
        let commits: Vec<Value> = items(&response, None).iter().map(summarize_commit).collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "commits": commits,
            "count": commits.len(),
        })))
    }

    #[tool(
        name = "get_commit",
        description = "Get a commit with its full message, author and change stats"
    )]
    pub async fn get_commit(
        &self,
        Parameters(params): Parameters<CommitRefParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let git_ref = encode_segment(&params.git_ref, "ref")?;

        let r = self
            .github
            .get(&format!("{}/commits/{}", repo.route(), git_ref), &[])
            .await?;

        Ok(json_result(json!({
            "sha": r.get("sha"),
            "message": at(&r, "/commit/message"),
            "author": at(&r, "/commit/author/name"),
            "author_email": at(&r, "/commit/author/email"),
            "date": at(&r, "/commit/author/date"),
            "html_url": r.get("html_url"),
            "stats": r.get("stats"),
            "files_count": items(&r, Some("files")).len(),
        })))
    }

    #[tool(
        name = "compare_branches",
        description = "Compare two branches, tags or SHAs: ahead/behind counts and the first commits"
    )]
    pub async fn compare_branches(
        &self,
        Parameters(params): Parameters<CompareParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let base = encode_segment(&params.base, "base")?;
        let head = encode_segment(&params.head, "head")?;

        let route = format!("{}/compare/{}...{}", repo.route(), base, head);
        let r = self.github.get(&route, &[]).await?;

        Ok(json_result(summarize_compare(&r)))
    }
}
