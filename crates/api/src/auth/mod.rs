//! Identity: hosted-auth bearer tokens and anonymous session cookies.

pub mod jwt;
pub mod session;
