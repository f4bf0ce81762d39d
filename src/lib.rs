//! ESI Knife — a harvest engine for EVE Online's ESI public REST API.
//!
//! Given an OAuth2 access token, discovers every endpoint the token is
//! authorized to call, fans out concurrent requests (including endpoints
//! whose IDs must first be discovered by other calls), paginates each
//! response, and resolves numeric IDs embedded in the result to names.
//!
//! The harvest engine (C1-C7) is the crate's core; the OAuth2 browser flow,
//! HTTP front-end, and CLI output formatting are out of scope (spec.md §1)
//! and are not implemented here. [`cli`]/[`main`](../bin/esi-knife) provide
//! only thin wiring for manual/demo use.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod expander;
pub mod harvest;
pub mod http;
pub mod model;
pub mod names;
pub mod planner;
pub mod spec_cache;
pub mod spec_query;
pub mod state;
pub mod supervisor;

pub use error::{KnifeError, Result};
pub use http::{EsiClient, FetchBody, FetchResponse, PageInfo};
pub use model::{HarvestPlan, KnownParams, NameMap, ParamPools, ResultMap, Run, RunState};
pub use state::{MemoryStateStore, StateStore};
pub use supervisor::Supervisor;
