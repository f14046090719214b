pub mod cleanup_raw;
pub mod delta_sync;
pub mod full_sync;
