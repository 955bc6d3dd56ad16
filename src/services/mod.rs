pub mod auth_demo;
pub mod auth_ldap;
pub mod auth_service;
pub use auth_service::{AuthError, Authenticator, CredentialVerifier, LoginBackend, VerifiedIdentity};

pub mod reports;
pub use reports::{FacetFilter, ReportError, ReportListing};

pub mod session_service;
pub use session_service::{LivySessionService, SessionStatus};

pub mod query_service;
pub use query_service::{QueryError, QueryResult, QueryRunner};
