use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The tenant of a request: the raw `Host` header string, or `"default"`
/// when the header is absent. Every persisted entity is partitioned by this
/// value; nothing ever reads or writes across tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tenant(String);

impl Tenant {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    /// The storage partition key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relying-party id for the WebAuthn ceremony: the host without its
    /// port, with `127.0.0.1` normalized to `localhost`. This is computed
    /// independently of the storage key on purpose; the two need not match.
    pub fn rp_id(&self) -> String {
        let hostname = self.0.split(':').next().unwrap_or(&self.0);
        if hostname == "127.0.0.1" {
            "localhost".to_string()
        } else {
            hostname.to_string()
        }
    }

    /// Cookie-name-safe suffix for the per-tenant admin session cookie.
    pub fn cookie_suffix(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// Name of this tenant's admin session cookie.
    pub fn admin_cookie_name(&self) -> String {
        format!("admin_session_{}", self.cookie_suffix())
    }
}

/// Derive the tenant from the `Host` header. Total: never fails, falls back
/// to the `"default"` tenant.
pub fn resolve(host_header: Option<&str>) -> Tenant {
    Tenant::new(host_header.unwrap_or("default"))
}

impl FromRequestParts<AppState> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok());
        Ok(resolve(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_host_falls_back_to_default() {
        assert_eq!(resolve(None).as_str(), "default");
    }

    #[test]
    fn host_header_is_used_verbatim_as_partition_key() {
        assert_eq!(resolve(Some("board.example.com")).as_str(), "board.example.com");
        assert_eq!(resolve(Some("localhost:3000")).as_str(), "localhost:3000");
    }

    #[test]
    fn rp_id_strips_port() {
        assert_eq!(resolve(Some("board.example.com:8443")).rp_id(), "board.example.com");
    }

    #[test]
    fn rp_id_normalizes_loopback_ip() {
        assert_eq!(resolve(Some("127.0.0.1:3000")).rp_id(), "localhost");
        assert_eq!(resolve(Some("127.0.0.1")).rp_id(), "localhost");
    }

    #[test]
    fn rp_id_leaves_other_hosts_alone() {
        assert_eq!(resolve(Some("localhost")).rp_id(), "localhost");
        assert_eq!(resolve(Some("192.168.1.4:3000")).rp_id(), "192.168.1.4");
    }

    #[test]
    fn admin_cookie_name_is_sanitized_per_tenant() {
        let tenant = resolve(Some("board.example.com:8443"));
        assert_eq!(
            tenant.admin_cookie_name(),
            "admin_session_board_example_com_8443"
        );
    }

    #[test]
    fn distinct_hosts_get_distinct_cookie_names() {
        let a = resolve(Some("a.test"));
        let b = resolve(Some("b.test"));
        assert_ne!(a.admin_cookie_name(), b.admin_cookie_name());
    }
}
