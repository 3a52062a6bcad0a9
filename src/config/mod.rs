mod settings;

pub use settings::{Config, DEFAULT_DATABASE_FILE, DEFAULT_LOG_FILTER, EXAMPLE_CONFIG};
