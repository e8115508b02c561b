use rmcp::model::ErrorData;

#[derive(Debug, thiserror::Error)]
pub enum McpGithubError {
    #[error("{}", describe_transport_error(.0))]
    GitHub(#[from] octocrab::Error),

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Repository {0} is not in the allowed list")]
    RepoNotAllowed(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Other(String),
}

impl McpGithubError {
    pub fn to_mcp_error(&self) -> ErrorData {
        match self {
            McpGithubError::MissingParam(_)
            | McpGithubError::InvalidParam(_)
            | McpGithubError::RepoNotAllowed(_) => ErrorData::invalid_params(self.to_string(), None),
            McpGithubError::Unauthenticated => ErrorData::invalid_params(self.to_string(), None),
            McpGithubError::GitHub(_) | McpGithubError::Api { .. } | McpGithubError::Other(_) => {
                ErrorData::internal_error(self.to_string(), None)
            }
        }
    }
}

impl From<McpGithubError> for ErrorData {
    fn from(err: McpGithubError) -> Self {
        err.to_mcp_error()
    }
}

/// octocrab's `Display` ends in `Found at <backtrace>` for most of its
/// variants; only the first line goes back to clients.
fn describe_transport_error(err: &octocrab::Error) -> String {
    let rendered = err.to_string();
    let summary = rendered.lines().next().unwrap_or_default().trim();
    format!("GitHub API request failed: {}", summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn test_param_errors_map_to_invalid_params() {
        let err = McpGithubError::RepoNotAllowed("acme/secret".to_string());
        assert_eq!(err.to_mcp_error().code, ErrorCode::INVALID_PARAMS);
        assert!(err.to_string().contains("acme/secret"));

        let err = McpGithubError::InvalidParam("merge_method".to_string());
        assert_eq!(ErrorData::from(err).code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn test_other_maps_to_internal_error() {
        let err = McpGithubError::Other("boom".to_string());
        assert_eq!(err.to_mcp_error().code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn test_api_error_keeps_status() {
        let err = McpGithubError::Api {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "GitHub API error 404: Not Found");
        assert_eq!(err.to_mcp_error().code, ErrorCode::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_transport_errors_render_without_backtrace() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/empty")
            .with_status(200)
            .create_async()
            .await;
        let octocrab = octocrab::OctocrabBuilder::new()
            .base_uri(server.url())
            .unwrap()
            .build()
            .unwrap();

        // an empty body is a serde EOF error inside octocrab
        let source = octocrab
            .get::<serde_json::Value, _, ()>("/empty", None)
            .await
            .unwrap_err();
        assert!(source.to_string().contains("Found at"));

        let message = McpGithubError::from(source).to_string();
        assert!(message.starts_with("GitHub API request failed: Serde Error"), "{}", message);
        assert!(!message.contains('\n'));
        assert!(!message.contains("Found at"));
    }
}
