use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use super::{at, items, json_result, pick, McpGithubServer, RepoPageParams, RepoParams};
use crate::github::sanitize_github_name;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetDefaultRepoParams {
    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name to use when later calls omit repo")]
    pub repo: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListUserReposParams {
    #[schemars(description = "Repository type: all, owner, member (default: all)")]
    #[serde(default, rename = "type")]
    pub repo_type: Option<String>,

    #[schemars(description = "Sort by: created, updated, pushed, full_name (default: updated)")]
    #[serde(default)]
    pub sort: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListOrgReposParams {
    #[schemars(description = "Organization login")]
    pub org: String,

    #[schemars(description = "Repository type: all, public, private, forks, sources, member (default: all)")]
    #[serde(default, rename = "type")]
    pub repo_type: Option<String>,

    #[schemars(description = "Sort by: created, updated, pushed, full_name (default: updated)")]
    #[serde(default)]
    pub sort: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateRepositoryParams {
    #[schemars(description = "Repository name")]
    pub name: String,

    #[schemars(description = "Repository description")]
    #[serde(default)]
    pub description: Option<String>,

    #[schemars(description = "Create a private repository (default: false)")]
    #[serde(default)]
    pub private: Option<bool>,

    #[schemars(description = "Initialize with a README (default: true)")]
    #[serde(default)]
    pub auto_init: Option<bool>,

    #[schemars(description = "Create under this organization instead of the authenticated user")]
    #[serde(default)]
    pub org: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ForkRepositoryParams {
    #[schemars(description = "Owner of the repository to fork")]
    pub source_owner: String,

    #[schemars(description = "Name of the repository to fork")]
    pub source_repo: String,

    #[schemars(description = "Fork into this organization instead of the authenticated user")]
    #[serde(default)]
    pub organization: Option<String>,

    #[schemars(description = "Name for the fork (default: same as source)")]
    #[serde(default)]
    pub name: Option<String>,
}

#[tool_router(router = repository_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "set_default_repo",
        description = "Set the repository used when later calls omit owner/repo. Applies to every client of this server"
    )]
    pub async fn set_default_repo(
        &self,
        Parameters(params): Parameters<SetDefaultRepoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let owner = self.scope.resolve_owner(params.owner.as_deref())?;
        sanitize_github_name(&owner, "owner")?;
        sanitize_github_name(params.repo.trim(), "repo")?;

        let repo = self.scope.set_default(&owner, &params.repo)?;

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Default repository set to {}", repo.full_name()),
            "owner": repo.owner,
            "repo": repo.repo,
        })))
    }

    #[tool(
        name = "get_repository",
        description = "Get repository info including description, visibility, default branch, language and counters"
    )]
    pub async fn get_repository(
        &self,
        Parameters(params): Parameters<RepoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let r = self.github.get(&repo.route(), &[]).await?;

        Ok(json_result(pick(
            &r,
            &[
                "name",
                "full_name",
                "description",
                "html_url",
                "clone_url",
                "private",
                "fork",
                "archived",
                "default_branch",
                "language",
                "stargazers_count",
                "forks_count",
                "watchers_count",
                "open_issues_count",
                "created_at",
                "updated_at",
                "pushed_at",
            ],
        )))
    }

    #[tool(
        name = "list_user_repos",
        description = "List repositories of the authenticated user"
    )]
    pub async fn list_user_repos(
        &self,
        Parameters(params): Parameters<ListUserReposParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.github.require_auth()?;
        let mut query = self.page_query(params.per_page, params.page);
        query.push(("type", params.repo_type.unwrap_or_else(|| "all".to_string())));
        query.push(("sort", params.sort.unwrap_or_else(|| "updated".to_string())));

        let response = self.github.get("/user/repos", &query).await?;
        let repos: Vec<serde_json::Value> = items(&response, None)
            .iter()
            .map(summarize_repo)
            .collect();

        Ok(json_result(json!({
            "repos": repos,
            "count": repos.len(),
        })))
    }

    #[tool(
        name = "list_org_repos",
        description = "List repositories of an organization"
    )]
    pub async fn list_org_repos(
        &self,
        Parameters(params): Parameters<ListOrgReposParams>,
    ) -> Result<CallToolResult, ErrorData> {
        sanitize_github_name(&params.org, "org")?;

        let mut query = self.page_query(params.per_page, params.page);
        query.push(("type", params.repo_type.unwrap_or_else(|| "all".to_string())));
        query.push(("sort", params.sort.unwrap_or_else(|| "updated".to_string())));

        let route = format!("/orgs/{}/repos", params.org);
        let response = self.github.get(&route, &query).await?;
        let repos: Vec<serde_json::Value> = items(&response, None)
            .iter()
            .map(summarize_repo)
            .collect();

        Ok(json_result(json!({
            "org": params.org,
            "repos": repos,
            "count": repos.len(),
        })))
    }

    #[tool(
        name = "create_repository",
        description = "Create a repository for the authenticated user or an organization"
    )]
    pub async fn create_repository(
        &self,
        Parameters(params): Parameters<CreateRepositoryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.github.require_auth()?;
        sanitize_github_name(&params.name, "name")?;
        let route = match params.org.as_deref() {
            Some(org) => {
                sanitize_github_name(org, "org")?;
                format!("/orgs/{}/repos", org)
            }
            None => "/user/repos".to_string(),
        };

        let body = json!({
            "name": params.name,
            "description": params.description.unwrap_or_default(),
            "private": params.private.unwrap_or(false),
            "auto_init": params.auto_init.unwrap_or(true),
        });
        let r = self.github.post(&route, &body).await?;
        tracing::info!(repo = ?r.get("full_name"), "Created repository");

        let mut out = pick(&r, &["name", "full_name", "html_url", "clone_url", "private"]);
        out["status"] = json!("success");
        Ok(json_result(out))
    }

    #[tool(
        name = "delete_repository",
        description = "Delete a repository. This cannot be undone"
    )]
    pub async fn delete_repository(
        &self,
        Parameters(params): Parameters<RepoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        self.github.delete_no_content(&repo.route()).await?;
        tracing::warn!(repo = %repo.full_name(), "Deleted repository");

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Repository {} deleted", repo.full_name()),
        })))
    }

    #[tool(
        name = "fork_repository",
        description = "Fork a repository into the authenticated user's account or an organization"
    )]
    pub async fn fork_repository(
        &self,
        Parameters(params): Parameters<ForkRepositoryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.github.require_auth()?;
        sanitize_github_name(&params.source_owner, "source_owner")?;
        sanitize_github_name(&params.source_repo, "source_repo")?;

        let mut body = serde_json::Map::new();
        if let Some(org) = params.organization {
            body.insert("organization".to_string(), json!(org));
        }
        if let Some(name) = params.name {
            body.insert("name".to_string(), json!(name));
        }

        let route = format!(
            "/repos/{}/{}/forks",
            params.source_owner, params.source_repo
        );
        let r = self.github.post(&route, &serde_json::Value::Object(body)).await?;

        let mut out = pick(&r, &["name", "full_name", "html_url", "clone_url"]);
        out["status"] = json!("success");
        Ok(json_result(out))
    }

    #[tool(name = "list_forks", description = "List forks of a repository")]
    pub async fn list_forks(
        &self,
        Parameters(params): Parameters<RepoPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let response = self
            .github
            .get(&format!("{}/forks", repo.route()), &query)
            .await?;
        let forks: Vec<serde_json::Value> = items(&response, None)
            .iter()
            .map(|f| {
                json!({
                    "full_name": f.get("full_name"),
                    "owner": at(f, "/owner/login"),
                    "html_url": f.get("html_url"),
                    "created_at": f.get("created_at"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "forks": forks,
            "count": forks.len(),
        })))
    }

    #[tool(
        name = "list_contributors",
        description = "List contributors of a repository with their contribution counts"
    )]
    pub async fn list_contributors(
        &self,
        Parameters(params): Parameters<RepoPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let response = self
            .github
            .get(&format!("{}/contributors", repo.route()), &query)
            .await?;
        let contributors: Vec<serde_json::Value> = items(&response, None)
            .iter()
            .map(|c| pick(c, &["login", "avatar_url", "html_url", "contributions"]))
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "contributors": contributors,
            "count": contributors.len(),
        })))
    }

    #[tool(
        name = "list_languages",
        description = "Language breakdown of a repository in bytes of code"
    )]
    pub async fn list_languages(
        &self,
        Parameters(params): Parameters<RepoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let languages = self
            .github
            .get(&format!("{}/languages", repo.route()), &[])
            .await?;

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "languages": languages,
        })))
    }
}

fn summarize_repo(r: &serde_json::Value) -> serde_json::Value {
    pick(
        r,
        &[
            "name",
            "full_name",
            "description",
            "html_url",
            "private",
            "fork",
            "stargazers_count",
            "language",
            "updated_at",
        ],
    )
}
