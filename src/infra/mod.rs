pub mod http_client;
pub mod progress;
pub mod sqlite_sink;
