pub mod remote;

pub use remote::BybitClient;
