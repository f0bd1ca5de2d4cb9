pub mod portfolio_summary;
