//! Per-session challenge memoization.
//!
//! Server challenges may be single-use nonces tied to their first issuance,
//! so a retried local crypto operation must reuse the challenge it already
//! has. The cache holds at most one challenge per method per session and
//! never re-issues once a fetch has succeeded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::types::{CredentialCreationOptions, CredentialRequestOptions, TotpProvision};
use crate::api::Backend;
use crate::error::Result;

/// Challenge-bearing method slots, one cache entry each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeKind {
    PasskeyRegister,
    PasskeyAssert,
    Totp,
}

/// Method-specific server-issued challenge payload.
#[derive(Debug, Clone)]
pub enum ChallengePayload {
    Creation(CredentialCreationOptions),
    Assertion(CredentialRequestOptions),
    Provision(TotpProvision),
}

/// A cached challenge and when it was issued.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub kind: ChallengeKind,
    pub payload: ChallengePayload,
    pub issued_at: DateTime<Utc>,
}

/// One-challenge-per-method memoization for a single session.
#[derive(Default)]
pub struct ChallengeCache {
    slots: HashMap<ChallengeKind, Challenge>,
}

impl ChallengeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration options, issued at most once per session.
    pub async fn creation_options(
        &mut self,
        backend: &dyn Backend,
        acid: &str,
    ) -> Result<CredentialCreationOptions> {
        if let Some(challenge) = self.slots.get(&ChallengeKind::PasskeyRegister) {
            debug!(kind = ?challenge.kind, "Reusing cached challenge");
            if let ChallengePayload::Creation(options) = &challenge.payload {
                return Ok(options.clone());
            }
        }
        let options = backend.registration_challenge(acid).await?;
        self.insert(ChallengeKind::PasskeyRegister, ChallengePayload::Creation(options.clone()));
        Ok(options)
    }

    /// Assertion options, issued at most once per session.
    pub async fn assertion_options(
        &mut self,
        backend: &dyn Backend,
        acid: &str,
    ) -> Result<CredentialRequestOptions> {
        if let Some(challenge) = self.slots.get(&ChallengeKind::PasskeyAssert) {
            debug!(kind = ?challenge.kind, "Reusing cached challenge");
            if let ChallengePayload::Assertion(options) = &challenge.payload {
                return Ok(options.clone());
            }
        }
        let options = backend.assertion_challenge(acid).await?;
        self.insert(ChallengeKind::PasskeyAssert, ChallengePayload::Assertion(options.clone()));
        Ok(options)
    }

    /// TOTP provisioning payload, issued at most once per session.
    pub async fn totp_provision(
        &mut self,
        backend: &dyn Backend,
        acid: &str,
    ) -> Result<TotpProvision> {
        if let Some(challenge) = self.slots.get(&ChallengeKind::Totp) {
            debug!(kind = ?challenge.kind, "Reusing cached challenge");
            if let ChallengePayload::Provision(provision) = &challenge.payload {
                return Ok(provision.clone());
            }
        }
        let provision = backend.totp_provision(acid).await?;
        self.insert(ChallengeKind::Totp, ChallengePayload::Provision(provision.clone()));
        Ok(provision)
    }

    pub fn contains(&self, kind: ChallengeKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn issued_at(&self, kind: ChallengeKind) -> Option<DateTime<Utc>> {
        self.slots.get(&kind).map(|c| c.issued_at)
    }

    /// Drop all cached challenges (session teardown).
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn insert(&mut self, kind: ChallengeKind, payload: ChallengePayload) {
        debug!(?kind, "Caching issued challenge");
        self.slots.insert(
            kind,
            Challenge {
                kind,
                payload,
                issued_at: Utc::now(),
            },
        );
    }
}
