use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{items, json_result, pick, McpGithubServer};
use crate::error::McpGithubError;
use crate::github::sanitize_github_name;

const PROFILE_FIELDS: &[&str] = &[
    "login",
    "name",
    "bio",
    "html_url",
    "avatar_url",
    "company",
    "location",
    "blog",
    "public_repos",
    "public_gists",
    "followers",
    "following",
    "created_at",
];

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UsernameParams {
    #[schemars(description = "GitHub login")]
    pub username: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct UserPageParams {
    #[schemars(description = "GitHub login (default: the authenticated user)")]
    #[serde(default)]
    pub username: Option<String>,

    #[schemars(description = "Results per page (max 100)")]
    #[serde(default)]
    pub per_page: Option<u32>,

    #[schemars(description = "Page number (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,
}

/// `/user/<what>` for the token's account, `/users/{login}/<what>` otherwise.
fn user_route(username: Option<&str>, what: &str) -> Result<String, McpGithubError> {
    match username.map(str::trim).filter(|u| !u.is_empty()) {
        Some(login) => {
            sanitize_github_name(login, "username")?;
            Ok(format!("/users/{}/{}", login, what))
        }
        None => Ok(format!("/user/{}", what)),
    }
}

fn summarize_account(a: &Value) -> Value {
    pick(a, &["login", "html_url", "avatar_url"])
}

impl McpGithubServer {
    fn user_scoped_route(&self, username: Option<&str>, what: &str) -> Result<String, McpGithubError> {
        let route = user_route(username, what)?;
        if route.starts_with("/user/") {
            self.github.require_auth()?;
        }
        Ok(route)
    }

    async fn list_accounts(
        &self,
        params: UserPageParams,
        what: &str,
    ) -> Result<Vec<Value>, McpGithubError> {
        let route = self.user_scoped_route(params.username.as_deref(), what)?;
        let query = self.page_query(params.per_page, params.page);
        let response = self.github.get(&route, &query).await?;
        Ok(items(&response, None).iter().map(summarize_account).collect())
    }
}

#[tool_router(router = user_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "get_authenticated_user",
        description = "Profile of the account behind the configured GitHub token"
    )]
    pub async fn get_authenticated_user(&self) -> Result<CallToolResult, ErrorData> {
        self.github.require_auth()?;
        let r = self.github.get("/user", &[]).await?;

        let mut out = pick(&r, PROFILE_FIELDS);
        out["email"] = r.get("email").cloned().unwrap_or(Value::Null);
        Ok(json_result(out))
    }

    #[tool(name = "get_user", description = "Public profile of a GitHub user")]
    pub async fn get_user(
        &self,
        Parameters(params): Parameters<UsernameParams>,
    ) -> Result<CallToolResult, ErrorData> {
        sanitize_github_name(params.username.trim(), "username")?;
        let r = self
            .github
            .get(&format!("/users/{}", params.username.trim()), &[])
            .await?;

        Ok(json_result(pick(&r, PROFILE_FIELDS)))
    }

    #[tool(
        name = "list_followers",
        description = "List followers of a user (default: the authenticated user)"
    )]
    pub async fn list_followers(
        &self,
        Parameters(params): Parameters<UserPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let followers = self.list_accounts(params, "followers").await?;
        Ok(json_result(json!({
            "followers": followers,
            "count": followers.len(),
        })))
    }

    #[tool(
        name = "list_following",
        description = "List accounts a user follows (default: the authenticated user)"
    )]
    pub async fn list_following(
        &self,
        Parameters(params): Parameters<UserPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let following = self.list_accounts(params, "following").await?;
        Ok(json_result(json!({
            "following": following,
            "count": following.len(),
        })))
    }

    #[tool(
        name = "list_user_organizations",
        description = "List organizations a user belongs to (default: the authenticated user)"
    )]
    pub async fn list_user_organizations(
        &self,
        Parameters(params): Parameters<UserPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let route = self.user_scoped_route(params.username.as_deref(), "orgs")?;
        let query = self.page_query(params.per_page, params.page);
        let response = self.github.get(&route, &query).await?;

        // the orgs list carries API urls only; fall back to the web host
        let web_url = self.github.web_url();
        let orgs: Vec<Value> = items(&response, None)
            .iter()
            .map(|o| {
                let login = o.get("login").and_then(Value::as_str).unwrap_or_default();
                let html_url = o
                    .get("html_url")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| format!("{}/{}", web_url, login));
                json!({
                    "login": login,
                    "description": o.get("description"),
                    "html_url": html_url,
                    "avatar_url": o.get("avatar_url"),
                })
            })
            .collect();

        Ok(json_result(json!({
            "organizations": orgs,
            "count": orgs.len(),
        })))
    }
}
