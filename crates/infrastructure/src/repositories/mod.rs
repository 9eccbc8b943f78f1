pub mod sqlite_registry_repository;

pub use sqlite_registry_repository::SqliteRegistryRepository;
