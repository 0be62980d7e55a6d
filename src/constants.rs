//! Defaults for the marketplace search source and the relational sink.

// Search endpoint and identification
pub const DEFAULT_SEARCH_URL: &str = "https://api.mercadolibre.com/sites/MLA/search";
pub const DEFAULT_USER_AGENT: &str = "DataPipeline/1.0";
pub const DEFAULT_QUERY: &str = "chromecast";
pub const DEFAULT_TARGET_COUNT: usize = 500;

// Fetcher tuning
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_BUDGET: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_COURTESY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 10;
/// The search API refuses `limit` values above this.
pub const MAX_PAGE_SIZE: usize = 50;

// Normalization
/// Stored in `sellers.reputation_tier` when upstream has no power-seller status.
pub const NO_REPUTATION: &str = "no_reputation";

// Sink
pub const DEFAULT_DB_PATH: &str = "marketplace.db";
pub const DEFAULT_SNAPSHOT_DIR: &str = "data/raw";
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "raw_data";

pub const PRODUCTS_TABLE: &str = "products";
pub const SELLERS_TABLE: &str = "sellers";
pub const CATEGORIES_TABLE: &str = "categories";
pub const PRODUCT_CATEGORIES_TABLE: &str = "product_categories";

