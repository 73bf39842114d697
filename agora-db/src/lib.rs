pub mod client;
pub mod memory;
pub mod postgres;
mod record;
pub mod storage;
pub mod store;
