use crate::constants::demo;

use super::auth_service::{AuthError, CredentialVerifier, VerifiedIdentity};

/// Accepts exactly one fixed credential pair.
pub struct DemoVerifier;

#[async_trait::async_trait]
impl CredentialVerifier for DemoVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<VerifiedIdentity, AuthError> {
        if username == demo::USERNAME && password == demo::PASSWORD {
            return Ok(VerifiedIdentity {
                username: username.to_string(),
                display_name: demo::DISPLAY_NAME.to_string(),
            });
        }

        Err(AuthError::InvalidCredentials)
    }
}
