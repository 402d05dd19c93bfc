pub mod abort_on_drop;
pub mod backoff;
pub mod wallet;
