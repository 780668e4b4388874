//! Admin credential and one-time login code persistence, host-scoped like
//! everything else.

use rusqlite::{params, OptionalExtension};

use crate::db::models::AdminRecord;
use crate::error::{AppError, AppResult};
use crate::store::Store;
use crate::tenant::Tenant;

/// One-time codes live for ten minutes.
pub const AUTH_CODE_TTL_MS: i64 = 10 * 60 * 1000;

impl Store {
    pub fn get_admin(&self, tenant: &Tenant) -> AppResult<Option<AdminRecord>> {
        let conn = self.pool().get()?;
        let record = conn
            .query_row(
                "SELECT username, passkey_json FROM admin_credentials WHERE host = ?1",
                params![tenant.as_str()],
                |row| {
                    Ok(AdminRecord {
                        username: row.get(0)?,
                        passkey_json: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Store the tenant's sole admin credential. Refuses to overwrite an
    /// existing one; there is no in-band re-registration path.
    pub fn create_admin(
        &self,
        tenant: &Tenant,
        username: &str,
        passkey_json: &str,
    ) -> AppResult<()> {
        let conn = self.pool().get()?;

        let configured: bool = conn
            .query_row(
                "SELECT passkey_json IS NOT NULL FROM admin_credentials WHERE host = ?1",
                params![tenant.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(false);
        if configured {
            return Err(AppError::AlreadyConfigured);
        }

        conn.execute(
            "INSERT INTO admin_credentials (host, username, passkey_json)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(host) DO UPDATE SET username = ?2, passkey_json = ?3",
            params![tenant.as_str(), username, passkey_json],
        )?;
        Ok(())
    }

    /// Persist an updated passkey (signature counter bump) after a
    /// successful authentication.
    pub fn update_admin_passkey(&self, tenant: &Tenant, passkey_json: &str) -> AppResult<()> {
        let conn = self.pool().get()?;
        let updated = conn.execute(
            "UPDATE admin_credentials SET passkey_json = ?1 WHERE host = ?2",
            params![passkey_json, tenant.as_str()],
        )?;
        if updated == 0 {
            return Err(AppError::AdminNotConfigured);
        }
        Ok(())
    }

    // -- One-time login codes --

    /// Store a login code for (tenant, email), replacing any live one.
    pub fn store_auth_code(&self, tenant: &Tenant, email: &str, code: &str) -> AppResult<()> {
        let conn = self.pool().get()?;
        let expires_at = chrono::Utc::now().timestamp_millis() + AUTH_CODE_TTL_MS;
        conn.execute(
            "INSERT INTO auth_codes (host, email, code, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(host, email) DO UPDATE SET code = ?3, expires_at = ?4",
            params![tenant.as_str(), email, code, expires_at],
        )?;
        Ok(())
    }

    /// Check a submitted code: must exist, match exactly and be unexpired.
    /// Check and consumption are a single DELETE, so concurrent submissions
    /// of the same code can never redeem it more than once.
    pub fn verify_and_consume_auth_code(
        &self,
        tenant: &Tenant,
        email: &str,
        code: &str,
    ) -> AppResult<bool> {
        let conn = self.pool().get()?;
        let now = chrono::Utc::now().timestamp_millis();
        let consumed = conn.execute(
            "DELETE FROM auth_codes
             WHERE host = ?1 AND email = ?2 AND code = ?3 AND expires_at > ?4",
            params![tenant.as_str(), email, code, now],
        )?;
        Ok(consumed == 1)
    }
}
