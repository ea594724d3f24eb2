/// Application name
pub const APP_NAME: &str = "TrueKland";

/// Title length bounds for a listing (characters)
pub const POST_TITLE_MIN: usize = 3;
pub const POST_TITLE_MAX: usize = 100;

/// Description length bounds for a listing (characters)
pub const POST_DESCRIPTION_MIN: usize = 10;
pub const POST_DESCRIPTION_MAX: usize = 2000;

/// Upper bound of the estimated value of a listing
pub const POST_PRICE_MAX: f64 = 1_000_000.0;

/// Images attached to one listing
pub const POST_IMAGES_MIN: usize = 1;
pub const POST_IMAGES_MAX: usize = 5;

pub const DISPLAY_NAME_MIN: usize = 2;
pub const DISPLAY_NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 500;
pub const LOCATION_MAX: usize = 100;

pub const EMAIL_MAX: usize = 254;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 128;

/// Chat message text length (characters, after sanitizing)
pub const MESSAGE_MAX: usize = 1000;

/// Optional note attached to an exchange proposal
pub const EXCHANGE_MESSAGE_MAX: usize = 500;

/// Longest accepted URL
pub const URL_MAX: usize = 2048;

/// Path prefix under which uploaded images are served
pub const UPLOADS_PATH_PREFIX: &str = "/uploads/";

/// File extensions of stored uploads
pub const UPLOAD_EXTENSIONS: &[&str] = &["png", "jpg", "webp", "gif"];

/// Default session lifetime (7 days)
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

/// Maximum image upload size in bytes (5 MiB)
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Page size bounds for listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
