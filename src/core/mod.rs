pub mod applier;
pub mod chunked;
pub mod fetcher;
pub mod processor;
pub mod stats;
