use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::issues::is_pull_request;
use super::{at, items, json_result, names, pick, McpGithubServer};
use crate::config::explicit;
use crate::error::McpGithubError;
use crate::github::sanitize_github_name;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchCodeParams {
    #[schemars(description = "Search query (GitHub code search syntax)")]
    pub query: String,

    #[schemars(description = "Scope search to this owner/org")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Scope search to this repository (needs owner or a configured default owner)")]
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
pub struct SearchSortedParams {
    #[schemars(description = "Search query (GitHub search syntax, e.g. 'language:rust topic:cli')")]
    pub query: String,

    #[schemars(description = "Sort field (repositories: stars, forks, updated; issues: created, updated, comments)")]
    #[serde(default)]
    pub sort: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

fn require_query(query: &str) -> Result<(), McpGithubError> {
    if query.trim().is_empty() {
        return Err(McpGithubError::MissingParam("query must not be empty".to_string()));
    }
    Ok(())
}

impl McpGithubServer {
    /// Add a `repo:` or `user:` qualifier for an explicitly requested scope.
    fn scoped_code_query(&self, params: &SearchCodeParams) -> Result<String, McpGithubError> {
        let query = params.query.trim().to_string();
        let owner = explicit(params.owner.as_deref(), "user");
        let repo = explicit(params.repo.as_deref(), "repo");
        match (owner.as_deref(), repo.as_deref()) {
            (owner, Some(repo)) => {
                let repo = self.repo(owner, Some(repo))?;
                Ok(format!("{} repo:{}", query, repo.full_name()))
            }
            (Some(owner), None) => {
                sanitize_github_name(owner, "owner")?;
                Ok(format!("{} user:{}", query, owner))
            }
            (None, None) => Ok(query),
        }
    }
}

#[tool_router(router = search_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "search_code",
        description = "Search code across GitHub repositories using GitHub's code search syntax"
    )]
    pub async fn search_code(
        &self,
        Parameters(params): Parameters<SearchCodeParams>,
    ) -> Result<CallToolResult, ErrorData> {
        require_query(&params.query)?;
        let q = self.scoped_code_query(&params)?;

        let mut query = self.page_query(params.per_page, params.page);
        query.push(("q", q.clone()));
        let response = self.github.get("/search/code", &query).await?;

        let results: Vec<Value> = items(&response, Some("items"))
            .iter()
            .map(|i| {
                json!({
                    "name": i.get("name"),
                    "path": i.get("path"),
                    "repository": at(i, "/repository/full_name"),
                    "html_url": i.get("html_url"),
                    "sha": i.get("sha"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "query": q,
            "total_count": response.get("total_count"),
            "items": results,
        })))
    }

    #[tool(
        name = "search_repositories",
        description = "Search repositories (sorted by stars unless another sort is given)"
    )]
    pub async fn search_repositories(
        &self,
        Parameters(params): Parameters<SearchSortedParams>,
    ) -> Result<CallToolResult, ErrorData> {
        require_query(&params.query)?;

        let mut query = self.page_query(params.per_page, params.page);
        query.push(("q", params.query.trim().to_string()));
        query.push(("sort", params.sort.unwrap_or_else(|| "stars".to_string())));
        let response = self.github.get("/search/repositories", &query).await?;

        let results: Vec<Value> = items(&response, Some("items"))
            .iter()
            .map(|i| {
                pick(
                    i,
                    &[
                        "full_name",
                        "description",
                        "html_url",
                        "stargazers_count",
                        "forks_count",
                        "language",
                        "updated_at",
                    ],
                )
            })
            .collect();

        Ok(json_result(json!({
            "total_count": response.get("total_count"),
            "items": results,
        })))
    }

    #[tool(
        name = "search_issues",
        description = "Search issues and pull requests (use is:pr or is:issue in the query to narrow)"
    )]
    pub async fn search_issues(
        &self,
        Parameters(params): Parameters<SearchSortedParams>,
    ) -> Result<CallToolResult, ErrorData> {
        require_query(&params.query)?;

        let mut query = self.page_query(params.per_page, params.page);
        query.push(("q", params.query.trim().to_string()));
        query.push(("sort", params.sort.unwrap_or_else(|| "created".to_string())));
        let response = self.github.get("/search/issues", &query).await?;

        let results: Vec<Value> = items(&response, Some("items"))
            .iter()
            .map(|i| {
                json!({
                    "number": i.get("number"),
                    "title": i.get("title"),
                    "state": i.get("state"),
                    "html_url": i.get("html_url"),
                    "repository_url": i.get("repository_url"),
                    "author": at(i, "/user/login"),
                    "labels": names(i, "labels", "name"),
                    "created_at": i.get("created_at"),
                    "is_pull_request": is_pull_request(i),
                })
            })
            .collect();

        Ok(json_result(json!({
            "total_count": response.get("total_count"),
            "items": results,
        })))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{AllowedRepos, RepoScope};
    use crate::github::GithubClient;

    fn server(allowed: &str) -> McpGithubServer {
        let github = GithubClient::new(octocrab::Octocrab::default(), "https://api.github.com");
        let scope = RepoScope::new(Some("acme".to_string()), None, AllowedRepos::parse(allowed));
        McpGithubServer::new(github, Arc::new(scope), "test", 30)
    }

    fn params(owner: Option<&str>, repo: Option<&str>) -> SearchCodeParams {
        SearchCodeParams {
            query: " fn main ".to_string(),
            owner: owner.map(String::from),
            repo: repo.map(String::from),
            per_page: None,
            page: None,
        }
    }

    #[tokio::test]
    async fn test_scoped_code_query() {
        let server = server("");
        assert_eq!(server.scoped_code_query(&params(None, None)).unwrap(), "fn main");
        assert_eq!(
            server.scoped_code_query(&params(Some("octo"), None)).unwrap(),
            "fn main user:octo"
        );
        // placeholders are not scopes
        assert_eq!(
            server.scoped_code_query(&params(Some("user"), Some("repo"))).unwrap(),
            "fn main"
        );
        assert_eq!(
            server.scoped_code_query(&params(Some(" "), None)).unwrap(),
            "fn main"
        );
        // repo without owner falls back to the default owner
        assert_eq!(
            server.scoped_code_query(&params(None, Some("api"))).unwrap(),
            "fn main repo:acme/api"
        );
    }

    #[tokio::test]
    async fn test_scoped_code_query_honours_allow_list() {
        let server = server("acme/api");
        assert!(server.scoped_code_query(&params(None, Some("api"))).is_ok());
        assert!(matches!(
            server.scoped_code_query(&params(None, Some("secret"))),
            Err(McpGithubError::RepoNotAllowed(_))
        ));
    }

    #[test]
    fn test_require_query() {
        assert!(require_query("repo:acme/api").is_ok());
        assert!(matches!(require_query("  "), Err(McpGithubError::MissingParam(_))));
    }
}
