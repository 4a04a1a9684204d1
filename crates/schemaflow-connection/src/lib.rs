pub mod error;
pub mod resolver;

pub use error::{ResolverError, ResolverResult};
pub use resolver::{ConnectionResolver, ResolvedConnection, VaultLease};
