use std::fmt;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{items, json_result, pick, short_sha, McpGithubServer, RepoPageParams};
use crate::error::McpGithubError;
use crate::github::encode_segment;

/// A workflow is addressed either by numeric id or by its file name
/// (`ci.yml`).
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum WorkflowId {
    Id(u64),
    File(String),
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowId::Id(id) => write!(f, "{}", id),
            WorkflowId::File(name) => f.write_str(name),
        }
    }
}

impl WorkflowId {
    fn segment(&self) -> Result<String, McpGithubError> {
        match self {
            WorkflowId::Id(id) => Ok(id.to_string()),
            WorkflowId::File(name) => {
                if name.contains('/') {
                    return Err(McpGithubError::InvalidParam(
                        "workflow_id must be a workflow id or file name like ci.yml".to_string(),
                    ));
                }
                encode_segment(name, "workflow_id")
            }
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WorkflowParams {
    #[schemars(description = "Workflow id or workflow file name (e.g. ci.yml)")]
    pub workflow_id: WorkflowId,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TriggerWorkflowParams {
    #[schemars(description = "Workflow id or workflow file name (e.g. ci.yml)")]
    pub workflow_id: WorkflowId,

    #[schemars(description = "Branch or tag to run the workflow on (default: main)")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,

    #[schemars(description = "workflow_dispatch inputs as a JSON object string, e.g. {\"env\":\"prod\"}")]
    #[serde(default)]
    pub inputs: Option<String>,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListWorkflowRunsParams {
    #[schemars(description = "Only runs of this workflow (id or file name)")]
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,

    #[schemars(description = "Filter by status or conclusion, e.g. queued, in_progress, completed, success, failure")]
    #[serde(default)]
    pub status: Option<String>,

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
pub struct RunParams {
    #[schemars(description = "Workflow run id")]
    pub run_id: u64,

    #[schemars(description = "Repository owner (user or org). Defaults to the configured owner")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name. Defaults to the configured repository")]
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RunJobsParams {
    #[schemars(description = "Workflow run id")]
    pub run_id: u64,

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

/// Parse the `inputs` argument of a workflow dispatch.
fn parse_dispatch_inputs(raw: Option<&str>) -> Result<Option<Map<String, Value>>, McpGithubError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(McpGithubError::InvalidParam(
            "inputs must be a JSON object".to_string(),
        )),
        Err(e) => Err(McpGithubError::InvalidParam(format!(
            "inputs is not valid JSON: {}",
            e
        ))),
    }
}

fn summarize_run(r: &Value) -> Value {
    json!({
        "id": r.get("id"),
        "name": r.get("name"),
        "status": r.get("status"),
        "conclusion": r.get("conclusion"),
        "html_url": r.get("html_url"),
        "head_branch": r.get("head_branch"),
        "head_sha": short_sha(r, "/head_sha"),
        "event": r.get("event"),
        "created_at": r.get("created_at"),
        "updated_at": r.get("updated_at"),
        "run_attempt": r.get("run_attempt"),
    })
}

fn summarize_job(j: &Value) -> Value {
    let steps: Vec<Value> = items(j, Some("steps"))
        .iter()
        .map(|s| pick(s, &["name", "status", "conclusion"]))
        .collect();
    json!({
        "id": j.get("id"),
        "name": j.get("name"),
        "status": j.get("status"),
        "conclusion": j.get("conclusion"),
        "html_url": j.get("html_url"),
        "started_at": j.get("started_at"),
        "completed_at": j.get("completed_at"),
        "steps": steps,
    })
}

#[tool_router(router = action_router, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(name = "list_workflows", description = "List GitHub Actions workflows of a repository")]
    pub async fn list_workflows(
        &self,
        Parameters(params): Parameters<RepoPageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let response = self
            .github
            .get(&format!("{}/actions/workflows", repo.route()), &query)
            .await?;
        let workflows: Vec<Value> = items(&response, Some("workflows"))
            .iter()
            .map(|w| {
                pick(
                    w,
                    &["id", "name", "path", "state", "html_url", "created_at", "updated_at"],
                )
            })
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "total_count": response.get("total_count"),
            "workflows": workflows,
            "count": workflows.len(),
        })))
    }

    #[tool(name = "get_workflow", description = "Get a GitHub Actions workflow")]
    pub async fn get_workflow(
        &self,
        Parameters(params): Parameters<WorkflowParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = format!(
            "{}/actions/workflows/{}",
            repo.route(),
            params.workflow_id.segment()?
        );
        let r = self.github.get(&route, &[]).await?;

        Ok(json_result(pick(
            &r,
            &[
                "id",
                "name",
                "path",
                "state",
                "html_url",
                "badge_url",
                "created_at",
                "updated_at",
            ],
        )))
    }

    #[tool(
        name = "trigger_workflow",
        description = "Start a workflow_dispatch run on a branch or tag, with optional JSON inputs"
    )]
    pub async fn trigger_workflow(
        &self,
        Parameters(params): Parameters<TriggerWorkflowParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let inputs = parse_dispatch_inputs(params.inputs.as_deref())?;
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let git_ref = params.git_ref.unwrap_or_else(|| "main".to_string());

        let mut body = json!({"ref": git_ref});
        if let Some(inputs) = inputs {
            body["inputs"] = Value::Object(inputs);
        }

        let route = format!(
            "{}/actions/workflows/{}/dispatches",
            repo.route(),
            params.workflow_id.segment()?
        );
        self.github.post_no_content(&route, Some(&body)).await?;
        tracing::info!(repo = %repo.full_name(), workflow = %params.workflow_id, git_ref = %git_ref, "Dispatched workflow");

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Workflow {} triggered on {}", params.workflow_id, git_ref),
        })))
    }

    #[tool(
        name = "list_workflow_runs",
        description = "List workflow runs of a repository or of a single workflow"
    )]
    pub async fn list_workflow_runs(
        &self,
        Parameters(params): Parameters<ListWorkflowRunsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let mut query = self.page_query(params.per_page, params.page);
        if let Some(status) = params.status.filter(|s| !s.is_empty()) {
            query.push(("status", status));
        }

        let route = match &params.workflow_id {
            Some(id) => format!("{}/actions/workflows/{}/runs", repo.route(), id.segment()?),
            None => format!("{}/actions/runs", repo.route()),
        };
        let response = self.github.get(&route, &query).await?;
        let runs: Vec<Value> = items(&response, Some("workflow_runs"))
            .iter()
            .map(summarize_run)
            .collect();

        Ok(json_result(json!({
            "repo": repo.full_name(),
            "total_count": response.get("total_count"),
            "workflow_runs": runs,
            "count": runs.len(),
        })))
    }

    #[tool(name = "get_workflow_run", description = "Get a single workflow run")]
    pub async fn get_workflow_run(
        &self,
        Parameters(params): Parameters<RunParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let r = self
            .github
            .get(&format!("{}/actions/runs/{}", repo.route(), params.run_id), &[])
            .await?;

        Ok(json_result(pick(
            &r,
            &[
                "id",
                "name",
                "status",
                "conclusion",
                "html_url",
                "head_branch",
                "head_sha",
                "event",
                "run_attempt",
                "workflow_id",
                "created_at",
                "updated_at",
                "run_started_at",
            ],
        )))
    }

    #[tool(name = "cancel_workflow_run", description = "Cancel a queued or running workflow run")]
    pub async fn cancel_workflow_run(
        &self,
        Parameters(params): Parameters<RunParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = format!("{}/actions/runs/{}/cancel", repo.route(), params.run_id);
        self.github.post_no_content(&route, None).await?;
        tracing::info!(repo = %repo.full_name(), run_id = params.run_id, "Cancelled workflow run");

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Workflow run {} cancelled", params.run_id),
        })))
    }

    #[tool(name = "rerun_workflow", description = "Re-run a completed workflow run")]
    pub async fn rerun_workflow(
        &self,
        Parameters(params): Parameters<RunParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let route = format!("{}/actions/runs/{}/rerun", repo.route(), params.run_id);
        self.github.post_no_content(&route, None).await?;
        tracing::info!(repo = %repo.full_name(), run_id = params.run_id, "Re-ran workflow run");

        Ok(json_result(json!({
            "status": "success",
            "message": format!("Workflow run {} restarted", params.run_id),
        })))
    }

    #[tool(
        name = "list_workflow_jobs",
        description = "List the jobs of a workflow run with their step results"
    )]
    pub async fn list_workflow_jobs(
        &self,
        Parameters(params): Parameters<RunJobsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;
        let query = self.page_query(params.per_page, params.page);

        let route = format!("{}/actions/runs/{}/jobs", repo.route(), params.run_id);
        let response = self.github.get(&route, &query).await?;
        let jobs: Vec<Value> = items(&response, Some("jobs")).iter().map(summarize_job).collect();

        Ok(json_result(json!({
            "run_id": params.run_id,
            "jobs": jobs,
            "count": jobs.len(),
        })))
    }

    #[tool(
        name = "get_workflow_logs_url",
        description = "URL of the log archive of a workflow run (downloading it requires the same GitHub token)"
    )]
    pub async fn get_workflow_logs_url(
        &self,
        Parameters(params): Parameters<RunParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repo = self.repo(params.owner.as_deref(), params.repo.as_deref())?;

        Ok(json_result(json!({
            "logs_url": self.github.logs_url(&repo.owner, &repo.repo, params.run_id),
            "message": "Download this URL with an authenticated request; GitHub redirects to a short-lived zip archive",
        })))
    }
}
