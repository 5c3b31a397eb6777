//! Platform credential (passkey) capability boundary.
//!
//! The platform capability receives options whose binary fields (challenge,
//! user handle, allowed credential ids) are already decoded from their wire
//! encoding, and returns credentials whose binary fields the core serializes
//! back to transport-safe text.

use async_trait::async_trait;

use crate::api::types::{
    AssertionCredential, CredentialCreationOptions, CredentialRequestOptions, RegisteredCredential,
};
use crate::codec::Base64UrlData;
use crate::error::Result;

/// Output of a credential-creation ceremony.
#[derive(Debug, Clone)]
pub struct CreatedCredential {
    /// The new credential, serialized for transport.
    pub credential: RegisteredCredential,
    /// Authenticator data, submitted to the backend as its own field.
    pub authenticator_data: Base64UrlData,
}

/// WebAuthn-class platform capability.
///
/// Implementations reporting an absent or unsupported capability should
/// return [`AcidError::Capability`](crate::AcidError::Capability); user
/// dismissal of the platform prompt is a plain error and is never retried
/// automatically.
#[async_trait]
pub trait PasskeyProvider: Send + Sync {
    /// Create a new device-bound credential (enrollment).
    async fn create_credential(&self, options: CredentialCreationOptions)
        -> Result<CreatedCredential>;

    /// Produce an assertion with an existing credential (login).
    async fn get_assertion(&self, options: CredentialRequestOptions)
        -> Result<AssertionCredential>;
}

/// Provider for hosts without a platform authenticator.
///
/// Every ceremony fails with a capability error, which routes the user to an
/// alternate method rather than a hard failure.
pub struct UnsupportedPasskey;

#[async_trait]
impl PasskeyProvider for UnsupportedPasskey {
    async fn create_credential(
        &self,
        _options: CredentialCreationOptions,
    ) -> Result<CreatedCredential> {
        Err(crate::AcidError::Capability(
            "platform authenticator not available on this host".into(),
        ))
    }

    async fn get_assertion(
        &self,
        _options: CredentialRequestOptions,
    ) -> Result<AssertionCredential> {
        Err(crate::AcidError::Capability(
            "platform authenticator not available on this host".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AcidError;
    use serde_json::json;

    #[tokio::test]
    async fn test_unsupported_provider_reports_capability_error() {
        let options: CredentialCreationOptions = serde_json::from_value(json!({
            "challenge": "AAEC",
            "user": {"id": "AQ"}
        }))
        .unwrap();

        let err = UnsupportedPasskey.create_credential(options).await.unwrap_err();
        assert!(matches!(err, AcidError::Capability(_)));
    }
}
