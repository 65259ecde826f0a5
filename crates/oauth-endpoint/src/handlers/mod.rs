//! HTTP endpoint glue over the redirect core.
//!
//! Handlers never render flow failures as blank error responses: every
//! failed step still resolves to a redirect so the browser stays navigable.

pub mod authorize;
pub mod consent;
