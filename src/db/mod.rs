//! PostgreSQL store and live row sampling

pub mod connection;
pub mod sampler;
pub mod store;

pub use connection::init_pool;
pub use sampler::PgRowSampler;
pub use store::PgStore;

/// Double-quote an identifier for PostgreSQL
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
