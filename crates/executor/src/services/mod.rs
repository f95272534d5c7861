pub mod command_service;
pub mod execution_service;
pub mod expiry_service;
pub mod scanner_service;
pub mod telegram_service;

#[cfg(test)]
pub(crate) mod mocks;
