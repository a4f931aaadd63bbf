//! Per-call invocation gateway.
//!
//! This crate is the runtime half of searchbridge. It takes the compiled
//! output of `searchbridge-openapi-tools` and registers each allowed
//! operation as an MCP tool whose callback runs a fixed pipeline:
//! validate -> resolve credentials -> build request -> run middleware ->
//! dispatch -> wrap result.
//!
//! It intentionally contains **no** transport plumbing and **no** OAuth
//! exchange logic; an authenticated session arrives as a collaborator
//! implementing [`credentials::DashboardSession`].

pub mod credentials;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod request;
