//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::error::Error;
use crate::models::{
    BlockedParams, CommentParams, CreateEpicParams, CreateStoryParams, DepParams, EpicStatusParams,
    ListParams, NextReadyParams, ReadyParams, SetContextParams, ShowParams, UpdateParams,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::{
    handler::server::ServerHandler, tool, tool_handler, tool_router, ErrorData as McpError,
    ServiceExt,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The backlog MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct BacklogMcpServer {
    /// Shared context for workspace management.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BacklogMcpServer {
    /// Set the workspace context for subsequent operations.
    #[tool(
        description = "Set the workspace root directory for all subsequent operations. Call this first before using other tools."
    )]
    async fn set_context(
        &self,
        Parameters(params): Parameters<SetContextParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.set_context(&params.workspace_root).await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Get current workspace context information.
    #[tool(description = "Show current workspace context and data file path. Useful for debugging.")]
    async fn where_am_i(&self) -> Result<CallToolResult, McpError> {
        match self.tools.where_am_i().await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Create a new epic.
    #[tool(description = "Create a new epic to group related stories.")]
    async fn create_epic(
        &self,
        Parameters(params): Parameters<CreateEpicParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .create_epic(
                params.title,
                params.description,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(epic) => Ok(CallToolResult::success(vec![Content::json(epic)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Create a new story.
    #[tool(
        description = "Create a new story under an epic with an optional priority (higher = more urgent)."
    )]
    async fn create_story(
        &self,
        Parameters(params): Parameters<CreateStoryParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .create_story(
                &params.epic_id,
                params.title,
                params.description,
                params.priority,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(story) => Ok(CallToolResult::success(vec![Content::json(story)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Show detailed information about a specific story.
    #[tool(
        description = "Show detailed information about a specific story including tasks, acceptance criteria, comments, and dependencies."
    )]
    async fn show(
        &self,
        Parameters(params): Parameters<ShowParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .show(&params.story_id, params.workspace_root.as_deref())
            .await
        {
            Ok(story) => Ok(CallToolResult::success(vec![Content::json(story)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// List stories with optional filters.
    #[tool(description = "List stories with optional filters (status, epic, priority, limit).")]
    async fn list(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .list(
                params.status.as_deref(),
                params.epic_id.as_deref(),
                params.priority,
                params.limit,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(stories) => Ok(CallToolResult::success(vec![Content::json(stories)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Update an existing story.
    #[tool(
        description = "Update an existing story's title, description, status (todo, in_progress, review, done), or priority."
    )]
    async fn update(
        &self,
        Parameters(params): Parameters<UpdateParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .update(
                &params.story_id,
                params.title,
                params.description,
                params.status.as_deref(),
                params.priority,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(story) => Ok(CallToolResult::success(vec![Content::json(story)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Set an epic's status.
    #[tool(
        description = "Set an epic's status (draft, ready, in_progress, done, on_hold). Epic status never gates story readiness."
    )]
    async fn epic_status(
        &self,
        Parameters(params): Parameters<EpicStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .epic_status(
                &params.epic_id,
                &params.status,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(epic) => Ok(CallToolResult::success(vec![Content::json(epic)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Add a dependency between stories.
    #[tool(
        description = "Record that one story depends on another: the dependent story is not ready until the other is done. Rejects duplicates and cycles."
    )]
    async fn dep(
        &self,
        Parameters(params): Parameters<DepParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .dep(
                &params.story_id,
                &params.depends_on_id,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(message) => Ok(CallToolResult::success(vec![Content::text(message)])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Remove a dependency between stories.
    #[tool(
        description = "Remove a dependency edge between stories. Removing an absent edge is reported, not an error."
    )]
    async fn undep(
        &self,
        Parameters(params): Parameters<DepParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .undep(
                &params.story_id,
                &params.depends_on_id,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(message) => Ok(CallToolResult::success(vec![Content::text(message)])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Claim the next ready story.
    #[tool(
        description = "Atomically claim the next ready story: highest priority first, oldest first within a priority. The story is moved to in_progress; null means nothing is ready."
    )]
    async fn next_ready(
        &self,
        Parameters(params): Parameters<NextReadyParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.next_ready(params.workspace_root.as_deref()).await {
            Ok(story) => Ok(CallToolResult::success(vec![Content::json(story)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Preview ready stories without claiming.
    #[tool(
        description = "Preview the ready queue in scheduling order without claiming anything."
    )]
    async fn ready(
        &self,
        Parameters(params): Parameters<ReadyParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .ready(params.limit, params.workspace_root.as_deref())
            .await
        {
            Ok(stories) => Ok(CallToolResult::success(vec![Content::json(stories)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Get blocked stories and their blockers.
    #[tool(
        description = "Get blocked stories showing which unfinished dependencies are blocking them."
    )]
    async fn blocked(
        &self,
        Parameters(params): Parameters<BlockedParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.blocked(params.workspace_root.as_deref()).await {
            Ok(blocked) => Ok(CallToolResult::success(vec![Content::json(blocked)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Add a comment to a story.
    #[tool(description = "Add a comment to a story with an author and body.")]
    async fn comment(
        &self,
        Parameters(params): Parameters<CommentParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .comment(
                &params.story_id,
                &params.author,
                &params.body,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(story) => Ok(CallToolResult::success(vec![Content::json(story)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }
}

impl BacklogMcpServer {
    /// Create a new backlog MCP server.
    #[must_use]
    pub fn new() -> Self {
        let context = Arc::new(RwLock::new(Context::new()));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Run the server over stdio until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to initialize or the
    /// connection ends abnormally.
    pub async fn run(self) -> crate::error::Result<()> {
        let service = self
            .serve(stdio())
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;
        service
            .waiting()
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;
        Ok(())
    }
}

impl Default for BacklogMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for BacklogMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "backlog-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Backlog MCP server for story tracking and scheduling. Call set_context first to set the workspace."
                    .into(),
            ),
        }
    }
}
