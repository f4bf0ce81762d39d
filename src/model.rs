//! Typed data model for a single harvest run (spec.md §3).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a run. Transitions are monotonic; `Complete`/`Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    New,
    Pending,
    Processing,
    Complete,
    Failed,
}

/// One user-initiated harvest session.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub access_token: String,
    pub state: RunState,
}

/// The (character, corp, alliance, scopes, roles) tuple a harvest plans against.
#[derive(Debug, Clone, Default)]
pub struct HarvestPlan {
    pub character_id: i64,
    /// Present only when the character belongs to a player corporation
    /// (corporation_id > config::esi::NPC_CORP_MAX_ID).
    pub corporation_id: Option<i64>,
    pub alliance_id: Option<i64>,
    pub scopes: HashSet<String>,
    pub roles: HashSet<String>,
}

/// `parent_param_name -> (child_param_name -> listing_route_template)`.
pub type ListingRoutes = HashMap<String, HashMap<String, String>>;

/// `parent_param_name -> (child_param_name -> concrete ID list)`, populated by C4.
pub type ParamPools = HashMap<String, HashMap<String, Vec<i64>>>;

/// Concrete URL (pagination already merged) -> response body, possibly an
/// error-marker string (spec.md §6, §9 "Heterogeneous return unions").
pub type ResultMap = HashMap<String, Value>;

/// Resolved integer ID -> display name (best-effort; not every ID resolves).
pub type NameMap = HashMap<i64, String>;

/// `known_params` passed into the planner: path-variable name -> concrete value.
pub type KnownParams = HashMap<String, i64>;
