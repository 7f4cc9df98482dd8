//! Persistence backends for the search pipeline.

mod mock;
mod postgres;

pub use mock::MockSearchStore;
pub use postgres::PgSearchStore;
