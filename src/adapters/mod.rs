// Adapters: concrete implementations of the domain ports (sources, alias
// library, storage).

pub mod alias;
pub mod http_source;
pub mod static_source;
pub mod storage;

pub use alias::InMemoryAliasLibrary;
pub use http_source::HttpJsonSource;
pub use static_source::StaticSource;
pub use storage::LocalStorage;
