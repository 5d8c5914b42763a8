// Source resolution: turns picked media references into readable local files

pub mod copy;
pub mod provider;
pub mod resolver;

pub use copy::DEFAULT_CHUNK_SIZE;
pub use provider::{ContentProvider, FileSystemProvider, PermissionFlag, PermissionGate};
pub use resolver::{ResolverConfig, SourceResolver};
