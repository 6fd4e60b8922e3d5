pub mod analytics;
pub mod changes;
pub mod position;
pub mod quote;
pub mod rates;
pub mod settings;
pub mod transaction;
pub mod year_data;
