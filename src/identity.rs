//! Anonymous principal issuance.

use uuid::Uuid;

/// Opaque per-device principal identifier.
pub type PrincipalId = String;

/// Source of principal ids; one id per device session.
pub trait IdentityProvider: Send + Sync {
    /// Issue a fresh principal id.
    fn issue(&self) -> PrincipalId;
}

/// Issues random anonymous ids, the way anonymous sign-in does.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn issue(&self) -> PrincipalId {
        Uuid::new_v4().simple().to_string()
    }
}
