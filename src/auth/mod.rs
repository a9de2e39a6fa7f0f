//! HTTP authentication.
//!
//! Only bearer-token header injection is supported; the token itself is kept
//! in the [`TokenStore`](crate::storage::TokenStore).

pub mod bearer;

pub use bearer::{apply_bearer, bearer_token, mask_token, normalize_token};
