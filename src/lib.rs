pub mod backend;
pub mod config;
pub mod element;
pub mod error;
pub mod formats;
pub mod identifier;
pub mod index;
pub mod model;
pub mod provider;
pub mod repo;

// Re-export common types for convenience
pub use backend::{FieldAssemblyBackend, GraphFetchBackend, MetadataBackend};
pub use config::{AutoSetConfig, IndexConfig, ProviderConfig};
pub use element::Element;
pub use error::{ErrorClass, ProviderError};
pub use formats::{TransformContext, TransformFn, TransformRegistry};
pub use identifier::{derive_set_spec, OaiIdentifier};
pub use index::{Index, IndexDocument, SearchIndexClient};
pub use model::{Granularity, Identify, MetadataFormat, RecordHeader, SetDescriptor};
pub use provider::{DataProvider, IdentifierPage, ProviderSession};
pub use repo::{HttpRepositoryClient, RepositoryClient};
