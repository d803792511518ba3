//! Digest authentication for method calls.
//!
//! Regular accounts authenticate with `sha512(account + login + salt)`. The
//! admin login uses a token that rotates every hour:
//! `sha512(YYYYMMDDHH + admin_salt)` in server local time.

use chrono::{DateTime, Local};
use sha2::{Digest, Sha512};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::requests::MethodRequest;

const ADMIN_HOUR_FORMAT: &str = "%Y%m%d%H";

#[derive(Clone)]
pub struct Authenticator {
    salt: String,
    admin_salt: String,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            salt: config.salt.clone(),
            admin_salt: config.admin_salt.clone(),
        }
    }

    pub fn user_token(&self, account: &str, login: &str) -> String {
        sha512_hex(&[account, login, &self.salt])
    }

    pub fn admin_token(&self, now: DateTime<Local>) -> String {
        let hour = now.format(ADMIN_HOUR_FORMAT).to_string();
        sha512_hex(&[&hour, &self.admin_salt])
    }

    pub fn expected_token(&self, request: &MethodRequest, now: DateTime<Local>) -> String {
        if request.is_admin() {
            self.admin_token(now)
        } else {
            self.user_token(
                request.account.as_deref().unwrap_or_default(),
                request.login.as_deref().unwrap_or_default(),
            )
        }
    }

    pub fn check(&self, request: &MethodRequest) -> bool {
        self.check_at(request, Local::now())
    }

    pub fn check_at(&self, request: &MethodRequest, now: DateTime<Local>) -> bool {
        info!(login = ?request.login, "checking authorization");
        let expected = self.expected_token(request, now);
        let authorized = request.token.as_deref() == Some(expected.as_str());
        if authorized {
            info!("authorization succeeded");
        } else {
            debug!(received = ?request.token, "authorization failed, token mismatch");
            info!("authorization failed");
        }
        authorized
    }
}

fn sha512_hex(parts: &[&str]) -> String {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
