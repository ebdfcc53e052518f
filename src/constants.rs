pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MAX_NAME_LENGTH: usize = 200;

pub const RECIPE_IMAGE_DIR: &str = "recipes";

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Seconds tag and ingredient lists stay in redis.
pub const REFERENCE_CACHE_TTL: u64 = 60 * 60;

/// Recipe bodies carry base64 images.
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;
