/// Match and player persistence.
pub mod match_store;
/// Persisted representations of the runtime types.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
