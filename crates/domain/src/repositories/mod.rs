pub mod registry_repository;

pub use registry_repository::RegistryRepository;
