use std::collections::HashMap;
use std::time::Instant;
use webauthn_rs::prelude::*;
use webauthn_rs::Webauthn;

use crate::tenant::Tenant;

/// Build a Webauthn instance for one tenant's relying party.
/// The rp-id comes from the tenant's host; the origin is the browser's
/// `Origin` header when present, otherwise derived from the host.
pub fn build_webauthn(
    tenant: &Tenant,
    origin_header: Option<&str>,
) -> Result<Webauthn, WebauthnError> {
    let rp_id = tenant.rp_id();
    let origin = origin_header
        .map(|o| o.to_string())
        .unwrap_or_else(|| format!("http://{}", tenant.as_str()));
    let raw_origin = url::Url::parse(&origin).map_err(|_| WebauthnError::Configuration)?;

    // The rp-id maps 127.0.0.1 to localhost; the primary origin must agree
    // or the builder rejects the pair. The browser still sends the literal
    // loopback origin in its client data, so that stays allowed too.
    let mut rp_origin = raw_origin.clone();
    if rp_origin.host_str() == Some("127.0.0.1") {
        rp_origin
            .set_host(Some("localhost"))
            .map_err(|_| WebauthnError::Configuration)?;
    }

    let mut builder = webauthn_rs::WebauthnBuilder::new(&rp_id, &rp_origin)?;
    if raw_origin != rp_origin {
        builder = builder.append_allowed_origin(&raw_origin);
    }
    builder.build()
}

/// Stable synthetic user handle for a tenant's admin. There is exactly one
/// admin identity per tenant, so the handle is a function of the tenant.
pub fn admin_user_handle(tenant: &Tenant) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, tenant.as_str().as_bytes())
}

/// A pending registration bundles the ceremony state with the tenant it was
/// started for, so a challenge can never complete under a different host.
pub struct PendingRegistration {
    pub reg_state: PasskeyRegistration,
    pub tenant: Tenant,
}

pub struct PendingAuthentication {
    pub auth_state: PasskeyAuthentication,
    pub tenant: Tenant,
}

/// Ephemeral in-memory store for WebAuthn registration/authentication
/// ceremonies. Each entry is keyed by a random ceremony ID and expires
/// after 5 minutes. Entries are removed on take, so a challenge is
/// single-use whether verification succeeds or fails.
pub struct CeremonyStore {
    registrations: HashMap<String, (Instant, PendingRegistration)>,
    authentications: HashMap<String, (Instant, PendingAuthentication)>,
}

impl CeremonyStore {
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            authentications: HashMap::new(),
        }
    }

    pub fn insert_registration(&mut self, id: String, pending: PendingRegistration) {
        self.clear_stale();
        self.registrations.insert(id, (Instant::now(), pending));
    }

    /// Retrieve and remove a pending registration for the given tenant.
    pub fn take_registration(&mut self, id: &str, tenant: &Tenant) -> Option<PendingRegistration> {
        self.registrations
            .remove(id)
            .map(|(_, pending)| pending)
            .filter(|pending| &pending.tenant == tenant)
    }

    pub fn insert_authentication(&mut self, id: String, pending: PendingAuthentication) {
        self.clear_stale();
        self.authentications.insert(id, (Instant::now(), pending));
    }

    pub fn take_authentication(
        &mut self,
        id: &str,
        tenant: &Tenant,
    ) -> Option<PendingAuthentication> {
        self.authentications
            .remove(id)
            .map(|(_, pending)| pending)
            .filter(|pending| &pending.tenant == tenant)
    }

    fn clear_stale(&mut self) {
        let cutoff = Instant::now() - std::time::Duration::from_secs(300);
        self.registrations.retain(|_, (t, _)| *t > cutoff);
        self.authentications.retain(|_, (t, _)| *t > cutoff);
    }
}

impl Default for CeremonyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_webauthn_for_plain_host() {
        let tenant = Tenant::new("board.example.com");
        assert!(build_webauthn(&tenant, None).is_ok());
    }

    #[test]
    fn build_webauthn_honors_origin_header() {
        let tenant = Tenant::new("localhost:3000");
        let wn = build_webauthn(&tenant, Some("http://localhost:3000"));
        assert!(wn.is_ok());
    }

    #[test]
    fn loopback_ip_builds_with_localhost_rp() {
        let tenant = Tenant::new("127.0.0.1:3000");
        assert_eq!(tenant.rp_id(), "localhost");
        assert!(build_webauthn(&tenant, Some("http://127.0.0.1:3000")).is_ok());
    }

    #[test]
    fn admin_user_handle_is_stable_per_tenant() {
        let a = Tenant::new("a.test");
        assert_eq!(admin_user_handle(&a), admin_user_handle(&a));
        assert_ne!(admin_user_handle(&a), admin_user_handle(&Tenant::new("b.test")));
    }

    #[test]
    fn ceremony_store_take_is_tenant_checked() {
        let mut store = CeremonyStore::new();
        assert!(store
            .take_registration("nonexistent", &Tenant::new("a.test"))
            .is_none());
        assert!(store
            .take_authentication("nonexistent", &Tenant::new("a.test"))
            .is_none());
    }
}
