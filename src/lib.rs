//! Launch and supervise short-lived worker containers on a Docker-compatible
//! engine.
//!
//! `workcell` resolves how to reach the engine from layered configuration and
//! the standard `DOCKER_*` environment variables, pulls images, creates and
//! starts containers with their standard streams attached, pipes input into
//! them, collects their output and reports how they exited.
//!
//! # Modules
//!
//! - [`api`]: Orchestration entry points shared by the CLI and library callers
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Engine connection, image pulls, lifecycle and attach streams
//! - [`error`]: Semantic error types for the application

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
