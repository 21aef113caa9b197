mod credentials;
mod refresh;
pub mod store;

pub use credentials::{Credentials, DEFAULT_EXPIRES_IN};
pub use refresh::{CredentialSink, OAuthRefresher, RefreshedToken, TokenRefresher};
pub use store::{FileTokenStore, StoreError, StoredToken, TokenStorage};
