//! Remote key set (JWKS) access: fetching and the signing-key cache.
pub mod resolver;
pub mod source;

pub use resolver::{KeyResolver, SigningKey};
pub use source::{HttpKeySetSource, KeySetError, KeySetSource};
