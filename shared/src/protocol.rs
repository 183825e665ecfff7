/// Path prefix of the management API exposed by every node
pub const API_PREFIX: &str = "/tequilapi";

/// Fixed username the node management API expects for password auth
pub const AUTH_USERNAME: &str = "myst";

/// Default management API port for newly registered nodes
pub const DEFAULT_NODE_PORT: u16 = 4449;

/// Public discovery service consulted for provider quality metrics
pub const DISCOVERY_URL: &str = "https://discovery.mysterium.network/api/v4";

/// Market-data service consulted for token price quotes
pub const MARKET_URL: &str = "https://pro-api.coinmarketcap.com";

/// Token slug queried against the market-data service
pub const TOKEN_SLUG: &str = "mysterium";
