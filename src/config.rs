//! Process configuration and repository scoping.
//!
//! Settings come from CLI flags, falling back to environment variables
//! (a `.env` file is loaded into the environment before parsing). The
//! repository scope decides which `owner/repo` a tool call acts on and
//! whether it is allowed to.

use std::sync::RwLock;

use clap::{Args, ValueEnum};

use crate::error::McpGithubError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Streamable HTTP on `/mcp`
    Http,
    /// MCP over stdin/stdout
    Stdio,
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// GitHub personal access token
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Owner (user or org) used when a tool call names none
    #[arg(long, env = "GH_DEFAULT_OWNER")]
    pub default_owner: Option<String>,

    /// Repository used when a tool call names none
    #[arg(long, env = "GH_DEFAULT_REPO")]
    pub default_repo: Option<String>,

    /// Comma-separated allow-list: owner/repo, owner/*, owner, globs like acme/api-*
    #[arg(long, env = "GH_ALLOWED_REPOS", default_value = "")]
    pub allowed_repos: String,

    /// Shared secret required on /mcp (X-API-Key or Authorization: Bearer)
    #[arg(long, env = "MCP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log verbosity (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// GitHub API base URL
    #[arg(long, env = "GH_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Server name reported to MCP clients
    #[arg(long, env = "MCP_SERVER_NAME", default_value = "GitHub MCP Server")]
    pub server_name: String,

    /// Default page size for list tools (capped at 100)
    #[arg(long, env = "MCP_MAX_RESULTS", default_value = "30")]
    pub max_results: u32,
}

impl Settings {
    /// The API key, if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    pub fn token(&self) -> Option<&str> {
        non_empty(self.token.as_deref())
    }

    pub fn repo_scope(&self) -> RepoScope {
        RepoScope::new(
            non_empty(self.default_owner.as_deref()).map(String::from),
            non_empty(self.default_repo.as_deref()).map(String::from),
            AllowedRepos::parse(&self.allowed_repos),
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            default_owner: None,
            default_repo: None,
            allowed_repos: String::new(),
            api_key: None,
            log_level: "info".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            server_name: "GitHub MCP Server".to_string(),
            max_results: 30,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One allow-list entry. `repo` of `"*"` covers every repository of the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPattern {
    pub owner: String,
    pub repo: String,
}

impl RepoPattern {
    pub fn matches(&self, owner: &str, repo: &str) -> bool {
        glob_match(&self.owner, owner) && glob_match(&self.repo, repo)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedRepos {
    patterns: Vec<RepoPattern>,
}

impl AllowedRepos {
    pub fn parse(raw: &str) -> Self {
        let patterns = raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match item.split_once('/') {
                Some((owner, repo)) => RepoPattern {
                    owner: owner.trim().to_string(),
                    repo: match repo.trim() {
                        "" => "*".to_string(),
                        r => r.to_string(),
                    },
                },
                None => RepoPattern {
                    owner: item.to_string(),
                    repo: "*".to_string(),
                },
            })
            .collect();
        Self { patterns }
    }

    /// An empty allow-list permits everything.
    pub fn is_unrestricted(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_allowed(&self, owner: &str, repo: &str) -> bool {
        self.is_unrestricted() || self.patterns.iter().any(|p| p.matches(owner, repo))
    }

    pub fn patterns(&self) -> &[RepoPattern] {
        &self.patterns
    }
}

/// `*` matches any run of characters; everything else is an ASCII
/// case-insensitive literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let t: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Route prefix `/repos/{owner}/{repo}`.
    pub fn route(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Default)]
struct RuntimeDefault {
    owner: Option<String>,
    repo: Option<String>,
}

/// Resolves the repository a tool call targets and enforces the allow-list.
///
/// Shared by every MCP session of the process, so a `set_default_repo`
/// issued over one HTTP request applies to the following ones.
#[derive(Debug)]
pub struct RepoScope {
    default_owner: Option<String>,
    default_repo: Option<String>,
    allowed: AllowedRepos,
    runtime: RwLock<RuntimeDefault>,
}

impl RepoScope {
    pub fn new(
        default_owner: Option<String>,
        default_repo: Option<String>,
        allowed: AllowedRepos,
    ) -> Self {
        Self {
            default_owner,
            default_repo,
            allowed,
            runtime: RwLock::new(RuntimeDefault::default()),
        }
    }

    pub fn allowed(&self) -> &AllowedRepos {
        &self.allowed
    }

    /// Owner from the call, else the runtime default, else the configured
    /// default. `user` is a placeholder models like to send and counts as absent.
    pub fn resolve_owner(&self, owner: Option<&str>) -> Result<String, McpGithubError> {
        if let Some(owner) = explicit(owner, "user") {
            return Ok(owner);
        }
        let runtime = self.runtime.read().map_err(poisoned)?;
        runtime
            .owner
            .clone()
            .or_else(|| self.default_owner.clone())
            .ok_or_else(|| {
                McpGithubError::MissingParam(
                    "owner is not set (pass owner, set GH_DEFAULT_OWNER, or call set_default_repo)"
                        .to_string(),
                )
            })
    }

    fn resolve_repo(&self, repo: Option<&str>) -> Result<String, McpGithubError> {
        if let Some(repo) = explicit(repo, "repo") {
            return Ok(repo);
        }
        let runtime = self.runtime.read().map_err(poisoned)?;
        runtime
            .repo
            .clone()
            .or_else(|| self.default_repo.clone())
            .ok_or_else(|| {
                McpGithubError::MissingParam(
                    "repo is not set (pass repo, set GH_DEFAULT_REPO, or call set_default_repo)"
                        .to_string(),
                )
            })
    }

    pub fn resolve(
        &self,
        owner: Option<&str>,
        repo: Option<&str>,
    ) -> Result<RepoRef, McpGithubError> {
        let repo_ref = RepoRef {
            owner: self.resolve_owner(owner)?,
            repo: self.resolve_repo(repo)?,
        };
        self.check_allowed(&repo_ref)?;
        Ok(repo_ref)
    }

    pub fn check_allowed(&self, repo_ref: &RepoRef) -> Result<(), McpGithubError> {
        if self.allowed.is_allowed(&repo_ref.owner, &repo_ref.repo) {
            Ok(())
        } else {
            tracing::warn!(repo = %repo_ref.full_name(), "Rejected repository outside allow-list");
            Err(McpGithubError::RepoNotAllowed(repo_ref.full_name()))
        }
    }

    pub fn set_default(&self, owner: &str, repo: &str) -> Result<RepoRef, McpGithubError> {
        let repo_ref = RepoRef {
            owner: owner.trim().to_string(),
            repo: repo.trim().to_string(),
        };
        self.check_allowed(&repo_ref)?;
        let mut runtime = self.runtime.write().map_err(poisoned)?;
        runtime.owner = Some(repo_ref.owner.clone());
        runtime.repo = Some(repo_ref.repo.clone());
        tracing::info!(repo = %repo_ref.full_name(), "Runtime default repository set");
        Ok(repo_ref)
    }
}

/// A caller-supplied name, or `None` when it is blank or the placeholder
/// models tend to send (`user` for owners, `repo` for repositories).
pub fn explicit(value: Option<&str>, placeholder: &str) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(placeholder))
        .map(String::from)
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> McpGithubError {
    McpGithubError::Other("repository scope lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(owner: Option<&str>, repo: Option<&str>, allowed: &str) -> RepoScope {
        RepoScope::new(
            owner.map(String::from),
            repo.map(String::from),
            AllowedRepos::parse(allowed),
        )
    }

    #[test]
    fn test_parse_allowed_repos_forms() {
        let allowed = AllowedRepos::parse(" acme/api , octo/* ,solo,, team/");
        assert_eq!(
            allowed.patterns(),
            &[
                RepoPattern { owner: "acme".into(), repo: "api".into() },
                RepoPattern { owner: "octo".into(), repo: "*".into() },
                RepoPattern { owner: "solo".into(), repo: "*".into() },
                RepoPattern { owner: "team".into(), repo: "*".into() },
            ]
        );
    }

    #[test]
    fn test_empty_allow_list_permits_everything() {
        let allowed = AllowedRepos::parse("");
        assert!(allowed.is_unrestricted());
        assert!(allowed.is_allowed("anyone", "anything"));
    }

    #[test]
    fn test_allow_list_matching() {
        let allowed = AllowedRepos::parse("acme/api,octo/*,solo,team/web-*");
        assert!(allowed.is_allowed("acme", "api"));
        assert!(!allowed.is_allowed("acme", "apix"));
        assert!(allowed.is_allowed("octo", "whatever"));
        assert!(allowed.is_allowed("solo", "dotfiles"));
        assert!(allowed.is_allowed("team", "web-frontend"));
        assert!(!allowed.is_allowed("team", "backend"));
        assert!(!allowed.is_allowed("stranger", "api"));
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let allowed = AllowedRepos::parse("Acme/API");
        assert!(allowed.is_allowed("acme", "api"));
        assert!(allowed.is_allowed("ACME", "Api"));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(glob_match("*-service", "billing-service"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
        assert!(!glob_match("abc", "abcd"));
        assert!(!glob_match("", "a"));
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let scope = scope(Some("acme"), Some("api"), "");
        let r = scope.resolve(None, None).unwrap();
        assert_eq!(r.full_name(), "acme/api");
        assert_eq!(r.route(), "/repos/acme/api");
    }

    #[test]
    fn test_resolve_explicit_overrides_defaults() {
        let scope = scope(Some("acme"), Some("api"), "");
        let r = scope.resolve(Some("octo"), Some("cli")).unwrap();
        assert_eq!(r.full_name(), "octo/cli");
    }

    #[test]
    fn test_resolve_treats_placeholders_as_absent() {
        let scope = scope(Some("acme"), Some("api"), "");
        let r = scope.resolve(Some("User"), Some(" repo ")).unwrap();
        assert_eq!(r.full_name(), "acme/api");
        let r = scope.resolve(Some("  "), Some("web")).unwrap();
        assert_eq!(r.full_name(), "acme/web");
    }

    #[test]
    fn test_resolve_missing_owner_or_repo() {
        let unset = scope(None, None, "");
        assert!(matches!(
            unset.resolve(None, Some("api")),
            Err(McpGithubError::MissingParam(_))
        ));
        let owner_only = scope(Some("acme"), None, "");
        assert!(matches!(
            owner_only.resolve(None, None),
            Err(McpGithubError::MissingParam(_))
        ));
    }

    #[test]
    fn test_resolve_enforces_allow_list() {
        let scope = scope(Some("acme"), None, "acme/api");
        assert!(scope.resolve(None, Some("api")).is_ok());
        assert!(matches!(
            scope.resolve(None, Some("secret")),
            Err(McpGithubError::RepoNotAllowed(name)) if name == "acme/secret"
        ));
    }

    #[test]
    fn test_set_default_overrides_configured_defaults() {
        let scope = scope(Some("acme"), Some("api"), "");
        scope.set_default("octo", "cli").unwrap();
        assert_eq!(scope.resolve(None, None).unwrap().full_name(), "octo/cli");
        assert_eq!(scope.resolve_owner(None).unwrap(), "octo");
    }

    #[test]
    fn test_set_default_rejects_disallowed_repo() {
        let scope = scope(Some("acme"), Some("api"), "acme/*");
        assert!(scope.set_default("octo", "cli").is_err());
        assert_eq!(scope.resolve(None, None).unwrap().full_name(), "acme/api");
    }

    #[test]
    fn test_settings_blank_values_are_absent() {
        let settings = Settings {
            api_key: Some("  ".to_string()),
            token: Some(String::new()),
            default_owner: Some(" ".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.api_key(), None);
        assert_eq!(settings.token(), None);
        assert!(settings.repo_scope().resolve_owner(None).is_err());
    }
}
