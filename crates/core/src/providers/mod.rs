pub mod traits;

pub mod remote_api;
#[cfg(not(target_arch = "wasm32"))]
pub mod yahoo_finance;
