//! # mssql-auth
//!
//! Authentication strategies for SQL Server connections.
//!
//! This crate provides various authentication methods, isolated from
//! connection logic for better modularity and testing.
//!
//! ## Supported Authentication Methods
//!
//! | Method | Feature Flag | Description |
//! |--------|--------------|-------------|
//! | SQL Authentication | default | Username/password |
//! | Azure AD Token | default | Pre-obtained access token (manual FEDAUTH) |
//! | Azure AD Device Code | default | Interactive device-code flow |
//! | Azure AD CLI | default | Delegates to the `az` CLI |
//! | Azure AD Environment | default | `AZURE_CLIENT_ID`/`AZURE_CLIENT_SECRET`/`AZURE_TENANT_ID` |
//! | Azure Managed Identity | `azure-identity` | VM/container identity |
//! | Service Principal | `azure-identity` | App credentials |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod acquirer;
pub mod azure_ad;
#[cfg(feature = "azure-identity")]
pub mod azure_identity_auth;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod provider;
pub mod sql_auth;
pub mod token_cache;

pub use acquirer::{
    ChainAcquirer, CliAcquirer, DeviceCodeAcquirer, EnvironmentAcquirer, TokenAcquirer,
};
pub use azure_ad::AzureAdAuth;
#[cfg(feature = "azure-identity")]
pub use azure_identity_auth::{ManagedIdentityAuth, ServicePrincipalAuth};
pub use credentials::Credentials;
#[cfg(feature = "zeroize")]
pub use credentials::{SecretString, SecureCredentials};
pub use error::AuthError;
pub use jwt::{JwtClaims, decode_claims};
pub use provider::{AsyncAuthProvider, AuthData, AuthMethod, AuthProvider};
pub use sql_auth::SqlAuthenticator;
pub use token_cache::{CachedToken, TokenCache};
