pub mod change_tracker;
pub mod cost_basis;
pub mod currency_service;
pub mod growth_service;
pub mod ledger_service;
pub mod sync_service;
pub mod transaction_log;
