//! Tool handlers against a mocked GitHub API.

use std::sync::Arc;

use mockito::{Matcher, Server, ServerGuard};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorCode};
use serde_json::{json, Value};

use github_mcp::config::{AllowedRepos, RepoScope};
use github_mcp::github::GithubClient;
use github_mcp::server::*;

async fn github_server() -> ServerGuard {
    Server::new_async().await
}

fn mcp(github: &ServerGuard, allowed: &str) -> McpGithubServer {
    let client = GithubClient::connect(Some("test-token"), &github.url()).unwrap();
    let scope = RepoScope::new(
        Some("acme".to_string()),
        Some("api".to_string()),
        AllowedRepos::parse(allowed),
    );
    McpGithubServer::new(client, Arc::new(scope), "test", 30)
}

fn payload(result: CallToolResult) -> Value {
    let text = &result.content[0].as_text().unwrap().text;
    serde_json::from_str(text).unwrap()
}

fn repo(owner: Option<&str>, repo: Option<&str>) -> Parameters<RepoParams> {
    Parameters(RepoParams {
        owner: owner.map(String::from),
        repo: repo.map(String::from),
    })
}

#[tokio::test]
async fn get_repository_uses_defaults_and_trims_fields() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/repos/acme/api")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "name": "api",
                "full_name": "acme/api",
                "private": false,
                "default_branch": "main",
                "stargazers_count": 42,
                "owner": {"login": "acme", "id": 1}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let out = payload(mcp(&github, "").get_repository(repo(None, None)).await.unwrap());

    mock.assert_async().await;
    assert_eq!(out["full_name"], "acme/api");
    assert_eq!(out["stargazers_count"], 42);
    assert_eq!(out["language"], Value::Null);
    assert!(out.get("owner").is_none());
}

#[tokio::test]
async fn placeholder_owner_and_repo_fall_back_to_defaults() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/repos/acme/api")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"full_name": "acme/api"}"#)
        .create_async()
        .await;

    mcp(&github, "")
        .get_repository(repo(Some("user"), Some("repo")))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn disallowed_repository_never_reaches_github() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = mcp(&github, "acme/api")
        .get_repository(repo(Some("acme"), Some("secret")))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    assert!(err.message.contains("acme/secret"));
}

#[tokio::test]
async fn owner_wildcard_allows_every_repo_of_owner() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/repos/acme/web")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"full_name": "acme/web"}"#)
        .create_async()
        .await;

    mcp(&github, "acme/*, other/tool")
        .get_repository(repo(None, Some("web")))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn list_issues_filters_out_pull_requests() {
    let mut github = github_server().await;
    github
        .mock("GET", "/repos/acme/api/issues")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("state".into(), "open".into()),
            Matcher::UrlEncoded("per_page".into(), "30".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"number": 1, "title": "Bug", "user": {"login": "ada"}, "labels": [{"name": "bug"}]},
                {"number": 2, "title": "Fix bug", "pull_request": {"url": "https://api.github.com/pulls/2"}},
                {"number": 3, "title": "Docs"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .list_issues(Parameters(ListIssuesParams::default()))
            .await
            .unwrap(),
    );

    assert_eq!(out["count"], 2);
    let numbers: Vec<u64> = out["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_eq!(out["issues"][0]["labels"], json!(["bug"]));
}

#[tokio::test]
async fn get_file_content_decodes_base64() {
    let mut github = github_server().await;
    github
        .mock("GET", "/repos/acme/api/contents/src/lib.rs")
        .match_query(Matcher::UrlEncoded("ref".into(), "dev".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "type": "file",
                "name": "lib.rs",
                "path": "src/lib.rs",
                "sha": "abc",
                "encoding": "base64",
                "content": "cHViIGZuIG1haW4oKSB7\nfQo=\n"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .get_file_content(Parameters(FileContentsParams {
                path: "src/lib.rs".to_string(),
                owner: None,
                repo: None,
                git_ref: Some("dev".to_string()),
            }))
            .await
            .unwrap(),
    );

    assert_eq!(out["content"], "pub fn main() {}\n");
    assert_eq!(out["sha"], "abc");
}

#[tokio::test]
async fn get_file_content_rejects_directories() {
    let mut github = github_server().await;
    github
        .mock("GET", "/repos/acme/api/contents/src")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"name": "lib.rs", "type": "file"}]"#)
        .create_async()
        .await;

    let err = mcp(&github, "")
        .get_file_content(Parameters(FileContentsParams {
            path: "src".to_string(),
            owner: None,
            repo: None,
            git_ref: None,
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn merge_with_unknown_method_is_rejected_before_any_call() {
    let mut github = github_server().await;
    let mock = github.mock("PUT", Matcher::Any).expect(0).create_async().await;

    let err = mcp(&github, "")
        .merge_pull_request(Parameters(MergePullRequestParams {
            pull_number: 7,
            commit_title: None,
            commit_message: None,
            merge_method: Some("octopus".to_string()),
            owner: None,
            repo: None,
        }))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn merge_pull_request_sends_method() {
    let mut github = github_server().await;
    let mock = github
        .mock("PUT", "/repos/acme/api/pulls/7/merge")
        .match_body(Matcher::PartialJson(json!({"merge_method": "squash"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"merged": true, "sha": "abc", "message": "Pull Request successfully merged"}"#)
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .merge_pull_request(Parameters(MergePullRequestParams {
                pull_number: 7,
                commit_title: None,
                commit_message: None,
                merge_method: Some("squash".to_string()),
                owner: None,
                repo: None,
            }))
            .await
            .unwrap(),
    );

    mock.assert_async().await;
    assert_eq!(out["merged"], true);
    assert_eq!(out["status"], "success");
}

#[tokio::test]
async fn delete_repository_accepts_no_content() {
    let mut github = github_server().await;
    let mock = github
        .mock("DELETE", "/repos/acme/api")
        .with_status(204)
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .delete_repository(repo(None, None))
            .await
            .unwrap(),
    );

    mock.assert_async().await;
    assert_eq!(out["status"], "success");
}

#[tokio::test]
async fn create_branch_reads_source_ref_then_creates_ref() {
    let mut github = github_server().await;
    let source = github
        .mock("GET", "/repos/acme/api/git/ref/heads/main")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ref": "refs/heads/main", "object": {"sha": "base123"}}"#)
        .create_async()
        .await;
    let created = github
        .mock("POST", "/repos/acme/api/git/refs")
        .match_body(Matcher::Json(json!({"ref": "refs/heads/feature/x", "sha": "base123"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ref": "refs/heads/feature/x", "object": {"sha": "base123"}, "url": "u"}"#)
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .create_branch(Parameters(CreateBranchParams {
                branch: "feature/x".to_string(),
                from_ref: None,
                owner: None,
                repo: None,
            }))
            .await
            .unwrap(),
    );

    source.assert_async().await;
    created.assert_async().await;
    assert_eq!(out["ref"], "refs/heads/feature/x");
}

#[tokio::test]
async fn trigger_workflow_rejects_invalid_inputs() {
    let mut github = github_server().await;
    let mock = github.mock("POST", Matcher::Any).expect(0).create_async().await;

    let err = mcp(&github, "")
        .trigger_workflow(Parameters(TriggerWorkflowParams {
            workflow_id: WorkflowId::File("ci.yml".to_string()),
            git_ref: None,
            inputs: Some("{not json".to_string()),
            owner: None,
            repo: None,
        }))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn github_errors_surface_status_and_message() {
    let mut github = github_server().await;
    github
        .mock("GET", "/repos/acme/gone")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "Not Found", "documentation_url": "https://docs.github.com"}"#)
        .create_async()
        .await;

    let err = mcp(&github, "")
        .get_repository(repo(None, Some("gone")))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert_eq!(err.message, "GitHub API error 404: Not Found");
}

#[tokio::test]
async fn non_json_error_pages_keep_their_status() {
    let mut github = github_server().await;
    github
        .mock("GET", "/repos/acme/api")
        .with_status(502)
        .with_header("content-type", "text/html")
        .with_body("<html>Bad Gateway</html>\n<p>upstream timed out</p>")
        .create_async()
        .await;

    let err = mcp(&github, "")
        .get_repository(repo(None, None))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert_eq!(err.message, "GitHub API error 502: <html>Bad Gateway</html>");
    assert!(!err.message.contains("Found at"));
}

fn file(path: &str) -> Parameters<FileContentsParams> {
    Parameters(FileContentsParams {
        path: path.to_string(),
        owner: None,
        repo: None,
        git_ref: None,
    })
}

fn file_body(path: &str) -> String {
    json!({
        "type": "file",
        "path": path,
        "sha": "abc",
        "encoding": "base64",
        "content": "aGk="
    })
    .to_string()
}

#[tokio::test]
async fn file_paths_with_spaces_are_percent_encoded() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/repos/acme/api/contents/docs/My%20File.md")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(file_body("docs/My File.md"))
        .create_async()
        .await;

    let out = payload(mcp(&github, "").get_file_content(file("docs/My File.md")).await.unwrap());

    mock.assert_async().await;
    assert_eq!(out["path"], "docs/My File.md");
    assert_eq!(out["content"], "hi");
}

#[tokio::test]
async fn unicode_paths_and_branches_are_percent_encoded() {
    let mut github = github_server().await;
    let contents = github
        .mock("GET", "/repos/acme/api/contents/docs/%D0%B3%D0%B0%D0%B9%D0%B4.md")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(file_body("docs/гайд.md"))
        .create_async()
        .await;
    let branch = github
        .mock("GET", "/repos/acme/api/branches/%D1%84%D0%B8%D1%87%D0%B0")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "фича", "protected": false, "commit": {"sha": "c0ffee"}}"#)
        .create_async()
        .await;
    let server = mcp(&github, "");

    let out = payload(server.get_file_content(file("docs/гайд.md")).await.unwrap());
    assert_eq!(out["path"], "docs/гайд.md");

    let out = payload(
        server
            .get_branch(Parameters(BranchParams {
                branch: "фича".to_string(),
                owner: None,
                repo: None,
            }))
            .await
            .unwrap(),
    );
    assert_eq!(out["name"], "фича");
    assert_eq!(out["sha"], "c0ffee");

    contents.assert_async().await;
    branch.assert_async().await;
}

#[tokio::test]
async fn branch_names_with_slashes_stay_one_segment() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/repos/acme/api/branches/feature%2Fx")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "feature/x", "commit": {"sha": "abc"}}"#)
        .create_async()
        .await;

    mcp(&github, "")
        .get_branch(Parameters(BranchParams {
            branch: "feature/x".to_string(),
            owner: None,
            repo: None,
        }))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn set_default_repo_respects_allow_list_and_redirects_calls() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/repos/acme/web/languages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"Rust": 1200}"#)
        .create_async()
        .await;
    let server = mcp(&github, "acme/api, acme/web");

    let err = server
        .set_default_repo(Parameters(SetDefaultRepoParams {
            owner: None,
            repo: "secret".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

    server
        .set_default_repo(Parameters(SetDefaultRepoParams {
            owner: None,
            repo: "web".to_string(),
        }))
        .await
        .unwrap();

    // clones share the runtime default, as HTTP requests do
    let out = payload(server.clone().list_languages(repo(None, None)).await.unwrap());
    mock.assert_async().await;
    assert_eq!(out["repo"], "acme/web");
    assert_eq!(out["languages"]["Rust"], 1200);
}

#[tokio::test]
async fn user_endpoints_require_a_token() {
    let github = github_server().await;
    let client = GithubClient::connect(None, &github.url()).unwrap();
    let scope = RepoScope::new(None, None, AllowedRepos::default());
    let server = McpGithubServer::new(client, Arc::new(scope), "test", 30);

    let err = server.get_authenticated_user().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn get_user_reads_public_profile() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/users/octocat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "login": "octocat",
                "name": "The Octocat",
                "public_repos": 8,
                "followers": 20,
                "plan": {"name": "pro"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .get_user(Parameters(UsernameParams {
                username: " octocat ".to_string(),
            }))
            .await
            .unwrap(),
    );

    mock.assert_async().await;
    assert_eq!(out["login"], "octocat");
    assert_eq!(out["public_repos"], 8);
    assert!(out.get("plan").is_none());
}

#[tokio::test]
async fn list_followers_of_named_user() {
    let mut github = github_server().await;
    let mock = github
        .mock("GET", "/users/octocat/followers")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "5".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"login": "ada", "id": 1, "html_url": "https://github.com/ada"}]"#)
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .list_followers(Parameters(UserPageParams {
                username: Some("octocat".to_string()),
                per_page: Some(5),
                page: Some(2),
            }))
            .await
            .unwrap(),
    );

    mock.assert_async().await;
    assert_eq!(out["count"], 1);
    assert_eq!(out["followers"][0]["login"], "ada");
    assert!(out["followers"][0].get("id").is_none());
}

#[tokio::test]
async fn organization_links_use_the_configured_host() {
    let mut github = github_server().await;
    github
        .mock("GET", "/user/orgs")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"login": "acme", "url": "https://api/orgs/acme"}]"#)
        .create_async()
        .await;

    let out = payload(
        mcp(&github, "")
            .list_user_organizations(Parameters(UserPageParams::default()))
            .await
            .unwrap(),
    );

    assert_eq!(
        out["organizations"][0]["html_url"],
        format!("{}/acme", github.url())
    );
}

#[tokio::test]
async fn gist_create_update_delete() {
    let mut github = github_server().await;
    let created = github
        .mock("POST", "/gists")
        .match_body(Matcher::Json(json!({
            "description": "scratch",
            "public": false,
            "files": {"notes.md": {"content": "# notes"}}
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "g1", "html_url": "https://gist.github.com/g1", "public": false}"#)
        .create_async()
        .await;
    let updated = github
        .mock("PATCH", "/gists/g1")
        .match_body(Matcher::Json(json!({
            "description": "renamed",
            "files": {"notes.md": {"content": "# more notes"}}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "g1", "html_url": "https://gist.github.com/g1", "files": {"notes.md": {}}}"#)
        .create_async()
        .await;
    let deleted = github
        .mock("DELETE", "/gists/g1")
        .with_status(204)
        .create_async()
        .await;
    let server = mcp(&github, "");

    let out = payload(
        server
            .create_gist(Parameters(CreateGistParams {
                filename: "notes.md".to_string(),
                content: "# notes".to_string(),
                description: Some("scratch".to_string()),
                public: None,
            }))
            .await
            .unwrap(),
    );
    assert_eq!(out["id"], "g1");

    let out = payload(
        server
            .update_gist(Parameters(UpdateGistParams {
                gist_id: "g1".to_string(),
                filename: Some("notes.md".to_string()),
                content: Some("# more notes".to_string()),
                description: Some("renamed".to_string()),
            }))
            .await
            .unwrap(),
    );
    assert_eq!(out["files"], json!(["notes.md"]));

    let out = payload(
        server
            .delete_gist(Parameters(GistIdParams {
                gist_id: "g1".to_string(),
            }))
            .await
            .unwrap(),
    );
    assert_eq!(out["status"], "success");

    created.assert_async().await;
    updated.assert_async().await;
    deleted.assert_async().await;
}
