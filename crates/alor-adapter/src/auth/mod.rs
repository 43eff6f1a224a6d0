/*
[INPUT]:  Refresh token and OAuth server
[OUTPUT]: Bearer tokens for REST requests and stream frames
[POS]:    Auth layer - handles Alor API authentication
[UPDATE]: When auth flow or token sources change
*/

pub mod jwt;
pub mod manager;
pub mod provider;

pub use jwt::{JwtManager, TokenData};
pub use manager::AuthManager;
pub use provider::{StaticTokenProvider, TokenProvider};
