mod object_staging_store;
mod store_factory;

pub use object_staging_store::ObjectStagingStore;
pub use store_factory::StagingStoreFactory;
