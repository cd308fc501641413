//! Authentication: passwords, access tokens, Google OAuth and TOTP.

mod config;
mod extract;
mod google;
pub mod password;
pub mod tfa;
pub mod token;

pub use config::OAuthConfig;
pub use extract::{bearer_token, AuthUser};
pub use google::GoogleOAuth;
pub use token::{Claims, Subject, TokenIssuer};
