pub mod common;
pub mod intent;
pub mod record;
