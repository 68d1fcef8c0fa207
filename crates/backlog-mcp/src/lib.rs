//! MCP server for backlog story tracking.
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! the backlog tracker's epics, stories, dependency graph, and readiness
//! scheduler to AI assistants.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling and directly
//! wraps the `BacklogStorage` trait from the backlog crate.
//!
//! # Tools
//!
//! ## Context Management
//! - `set_context` - Set the workspace root for all operations
//! - `where_am_i` - Show current workspace context
//!
//! ## Queries
//! - `next_ready` - Claim the next ready story (moves it to in_progress)
//! - `ready` - Preview the ready queue without claiming
//! - `blocked` - Get blocked stories with their blockers
//! - `list` - List stories with filters
//! - `show` - Show story details with dependencies
//!
//! ## Modification
//! - `create_epic` - Create a new epic
//! - `create_story` - Create a new story under an epic
//! - `update` - Update story fields
//! - `epic_status` - Set an epic's status
//! - `dep` - Add a dependency between stories
//! - `undep` - Remove a dependency between stories
//! - `comment` - Add a comment to a story

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::BacklogMcpServer;
