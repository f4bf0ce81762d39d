//! Configuration constants for the ESI harvest engine.

/// Upstream ESI endpoint shape and client behavior.
pub mod esi {
    use std::time::Duration;

    /// Default upstream base URL, overridable by the caller.
    pub const DEFAULT_BASE_URL: &str = "https://esi.evetech.net";

    /// API base path under which every planned route is substituted.
    pub const LATEST: &str = "/latest";

    /// Path to the swagger/OpenAPI description.
    pub const SWAGGER_PATH: &str = "/latest/swagger.json";

    /// Token verification endpoint.
    pub const VERIFY_PATH: &str = "/verify/";

    /// Batch name-resolution endpoint.
    pub const NAMES_PATH: &str = "/latest/universe/names/";

    /// Concurrent in-flight HTTP requests allowed per harvest stage.
    pub const FETCH_POOL_WIDTH: usize = 20;

    /// Connection pool size for the shared HTTP client.
    pub const POOL_MAX_IDLE_PER_HOST: usize = 100;

    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

    /// Default X-Esi-Error-Limit-Reset, seconds, if the header is absent or unparseable.
    pub const DEFAULT_ERROR_LIMIT_RESET: u64 = 1;

    /// Max attempts for transport-level (connection) failures before surfacing an error.
    pub const TRANSPORT_RETRIES: u32 = 3;

    /// Names-resolution max batch size.
    pub const NAMES_MAX_BATCH: usize = 1000;

    /// Corporation IDs at or below this value denote NPC corporations.
    pub const NPC_CORP_MAX_ID: i64 = 2_000_000;
}

/// Key-value store key prefixes (see the state store contract).
pub mod keys {
    pub const NEW: &str = "new.";
    pub const PENDING: &str = "pending.";
    pub const PROCESSING: &str = "processing.";
    pub const COMPLETE: &str = "complete.";
    pub const RATE_LIMIT: &str = "ratelimit.";
    pub const ALL_TIME: &str = "alltime";
    pub const ESI_JSON: &str = "esijson.";
    pub const AUTH_STATE: &str = "authstate.";
}

/// TTLs, in seconds, for each state-store key family.
pub mod ttl {
    use std::time::Duration;

    pub const PENDING: Duration = Duration::from_secs(70);
    pub const PROCESSING: Duration = Duration::from_secs(7200);
    pub const COMPLETE: Duration = Duration::from_secs(604_800);
    pub const RATE_LIMIT: Duration = Duration::from_secs(60);
    pub const SPEC_CACHE: Duration = Duration::from_secs(3600);
    pub const AUTH_STATE: Duration = Duration::from_secs(300);

    /// Spec cache refresh window (§4.2): re-check upstream if older than this.
    pub const SPEC_REFRESH_WINDOW: Duration = Duration::from_secs(300);
}

/// Rate-limit policy for the external-facing shell (per spec.md §6/§8; supersedes
/// the 5/min figure in the original Python `rate_limit()`, which predates this contract).
pub mod rate_limit {
    pub const MAX_PER_MINUTE: u32 = 20;
}

/// Poll cadence for the run supervisor.
pub mod supervisor {
    use std::time::Duration;

    pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
}

/// Routes and literal strings the planner/expander treat specially.
pub mod routes {
    /// Routes never emitted by the planner regardless of scope/role match.
    pub const IGNORE_LIST: &[&str] = &[
        "/loyalty/stores/{corporation_id}/offers/",
        "/characters/{character_id}/search/",
        "/corporations/{corporation_id}/contracts/{contract_id}/bids/",
        "/corporations/{corporation_id}/contracts/{contract_id}/items/",
        "/characters/{character_id}/opportunities/",
    ];
}

/// OAuth2 scope strings ESI grants (copied from the original callback-handler's
/// `SCOPES` list; used only to validate/describe tokens, never requested here
/// since the authorization flow itself is out of scope).
pub mod scopes {
    pub const ALL: &[&str] = &[
        "esi-alliances.read_contacts.v1",
        "esi-assets.read_assets.v1",
        "esi-assets.read_corporation_assets.v1",
        "esi-bookmarks.read_character_bookmarks.v1",
        "esi-bookmarks.read_corporation_bookmarks.v1",
        "esi-calendar.read_calendar_events.v1",
        "esi-characters.read_agents_research.v1",
        "esi-characters.read_blueprints.v1",
        "esi-characters.read_contacts.v1",
        "esi-characters.read_corporation_roles.v1",
        "esi-characters.read_fatigue.v1",
        "esi-characters.read_fw_stats.v1",
        "esi-characters.read_loyalty.v1",
        "esi-characters.read_medals.v1",
        "esi-characters.read_notifications.v1",
        "esi-characters.read_opportunities.v1",
        "esi-characters.read_standings.v1",
        "esi-characters.read_titles.v1",
        "esi-characterstats.read.v1",
        "esi-clones.read_clones.v1",
        "esi-clones.read_implants.v1",
        "esi-contracts.read_character_contracts.v1",
        "esi-contracts.read_corporation_contracts.v1",
        "esi-corporations.read_blueprints.v1",
        "esi-corporations.read_contacts.v1",
        "esi-corporations.read_container_logs.v1",
        "esi-corporations.read_corporation_membership.v1",
        "esi-corporations.read_divisions.v1",
        "esi-corporations.read_facilities.v1",
        "esi-corporations.read_fw_stats.v1",
        "esi-corporations.read_medals.v1",
        "esi-corporations.read_outposts.v1",
        "esi-corporations.read_standings.v1",
        "esi-corporations.read_starbases.v1",
        "esi-corporations.read_structures.v1",
        "esi-corporations.read_titles.v1",
        "esi-corporations.track_members.v1",
        "esi-fittings.read_fittings.v1",
        "esi-fleets.read_fleet.v1",
        "esi-industry.read_character_jobs.v1",
        "esi-industry.read_character_mining.v1",
        "esi-industry.read_corporation_jobs.v1",
        "esi-industry.read_corporation_mining.v1",
        "esi-killmails.read_corporation_killmails.v1",
        "esi-killmails.read_killmails.v1",
        "esi-location.read_location.v1",
        "esi-location.read_online.v1",
        "esi-location.read_ship_type.v1",
        "esi-mail.read_mail.v1",
        "esi-markets.read_character_orders.v1",
        "esi-markets.read_corporation_orders.v1",
        "esi-planets.manage_planets.v1",
        "esi-planets.read_customs_offices.v1",
        "esi-skills.read_skillqueue.v1",
        "esi-skills.read_skills.v1",
        "esi-universe.read_structures.v1",
        "esi-wallet.read_character_wallet.v1",
        "esi-wallet.read_corporation_wallets.v1",
    ];
}

/// Default values shared by the CLI and the library's public entry points.
pub mod defaults {
    pub const LOG_LEVEL: &str = "info";
    pub const USER_AGENT_PREFIX: &str = "ESI-knife/";
}
