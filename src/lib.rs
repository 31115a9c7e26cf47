//! Bearer-credential authentication gateway.
//!
//! Every protected request carries `Authorization: Bearer <token>`. The token is
//! verified either with a locally configured shared secret (HMAC) or with a
//! public key from the identity provider's published key set, and the verified
//! claims are handed to the handler.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

#[cfg(test)]
mod testutil;
