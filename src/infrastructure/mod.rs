pub mod coingecko_client;
pub mod memory_cache;
