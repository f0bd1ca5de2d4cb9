pub mod coin;
pub mod portfolio_entry;
