pub mod backoff;
pub mod naming;
