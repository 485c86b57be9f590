pub mod connectivity;
pub mod observer;
pub mod queue_store;
pub mod transport;
