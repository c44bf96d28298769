pub mod models;
pub mod postgres;

pub use models::*;
pub use postgres::Store;
