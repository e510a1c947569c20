use std::sync::Arc;

use anyhow::Context;
use financify_auth::Authenticator;
use financify_config::{AuthConfig, DatabaseConfig};

use crate::metrics::Metrics;
use crate::modules::users::{PgUserStore, UserStore};

/// Shared dependencies handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub auth: Arc<Authenticator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, auth: Arc<Authenticator>) -> Self {
        Self {
            users,
            auth,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

/// Loads signing keys and opens the PostgreSQL pool.
pub fn init_app_state(auth: &AuthConfig, database: &DatabaseConfig) -> anyhow::Result<AppState> {
    let authenticator = Authenticator::from_config(auth)
        .with_context(|| format!("loading signing keys from {}", auth.keys_dir.display()))?;
    let pool = financify_db::init_db_pool(database).context("configuring database pool")?;

    Ok(AppState::new(
        Arc::new(PgUserStore::new(pool)),
        Arc::new(authenticator),
    ))
}
