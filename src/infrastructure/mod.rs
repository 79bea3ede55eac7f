pub mod crypto;
pub mod notes;
pub mod notification;
pub mod observability;
pub mod persistence;
pub mod providers;
pub mod sessions;
pub mod storage;
