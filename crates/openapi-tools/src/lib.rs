//! OpenAPI description -> tool compilation.
//!
//! This crate is the pure half of searchbridge: it turns an already-parsed
//! API description tree into the inputs the invocation gateway needs.
//! It is intentionally free of network and process concerns; reading and
//! parsing description files is a collaborator's responsibility.
//!
//! Pipeline: [`expand::expand_refs`] inlines internal `$ref` pointers,
//! [`spec::ApiDescription`] types the result, [`schema::compile`] turns each
//! schema node into a runtime validator, and [`filter::ToolFilter`] decides
//! which operations are exposed.

pub mod error;
pub mod expand;
pub mod filter;
pub mod schema;
pub mod spec;
