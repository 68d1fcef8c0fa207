//! Backlog - agile work item tracking for autonomous workers.
//!
//! This crate provides the core library for the backlog tracker: epics and
//! stories with typed sub-records, a cycle-free story dependency graph, and a
//! readiness scheduler that atomically claims the next workable story.

#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod id_generation;
pub mod storage;
