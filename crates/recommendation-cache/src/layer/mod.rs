pub mod local_lru;
pub mod singleflight;
