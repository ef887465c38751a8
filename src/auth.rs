use std::sync::Arc;

use async_trait::async_trait;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{AuthSource, DefaultServerParameterProvider, LoginInfo, Password};
use pgwire::error::PgWireResult;

/// Cleartext password check against the single shared server password.
/// Any user name is accepted; pair with TLS outside a trusted network.
#[derive(Debug)]
pub struct SalonAuthSource {
    password: String,
}

impl SalonAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for SalonAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        tracing::debug!(user = ?login.user(), "password login");
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

pub type SalonStartupHandler =
    CleartextPasswordAuthStartupHandler<SalonAuthSource, DefaultServerParameterProvider>;

pub fn startup_handler(password: String) -> Arc<SalonStartupHandler> {
    Arc::new(CleartextPasswordAuthStartupHandler::new(
        SalonAuthSource::new(password),
        DefaultServerParameterProvider::default(),
    ))
}
