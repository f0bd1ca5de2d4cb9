pub mod cache_store;
pub mod price_api;
