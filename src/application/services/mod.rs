pub mod coin_gecko_service;
pub mod portfolio_service;
