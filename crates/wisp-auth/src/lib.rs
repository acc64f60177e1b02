//! # wisp-auth
//!
//! OAuth credential lifecycle for the wisp client.
//!
//! - **[`TokenManager`]**: single owner of the credential — validity-margin
//!   refresh, forced refresh after a service-side 401, single-flight under
//!   concurrent callers
//! - **[`oauth`]**: authorization-URL construction, code exchange, refresh
//! - **[`storage`]**: on-disk credential persistence (0o600)
//!
//! The browser step of the authorization-code flow is out of scope: callers
//! open [`oauth::authorization_url`] however they like and hand the captured
//! code to [`oauth::exchange_code`], then [`TokenManager::install`] it.

#![deny(unsafe_code)]

pub mod errors;
pub mod manager;
pub mod oauth;
pub mod storage;
pub mod types;

pub use errors::AuthError;
pub use manager::TokenManager;
pub use oauth::AuthConfig;
pub use types::Credential;
