//! # Financify CLI
//!
//! Operations behind the `financify-cli` binary, kept in a library so they
//! can be tested without a terminal.
//!
//! ```ignore
//! use financify_cli::{keygen, tokengen, token_block};
//!
//! let path = keygen(Path::new("keys"), Some("2024"))?;
//! let token = tokengen(&auth, "admin", &["ADMIN".to_string()], None, 8760)?;
//! println!("{}", token_block(&token));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use chrono::{Duration, Utc};
use financify_auth::{Authenticator, Claims, KNOWN_ROLES, ROLE_ADMIN, encode_pem, generate_signing_key};
use financify_core::hash_password;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 8760;

/// Generates an Ed25519 key and writes it to `<dir>/<kid>.pem`.
///
/// `kid` defaults to a fresh UUID. An existing file is never overwritten.
pub fn keygen(dir: &Path, kid: Option<&str>) -> anyhow::Result<PathBuf> {
    let kid = kid
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if kid.is_empty() || kid.contains(['/', '\\']) || kid.starts_with('.') {
        bail!("invalid kid {kid:?}");
    }

    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{kid}.pem"));
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let pem = encode_pem(&generate_signing_key())?;
    fs::write(&path, pem).with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions on {}", path.display()))?;
    }

    info!(kid = %kid, path = %path.display(), "Generated signing key");
    Ok(path)
}

/// Parses a comma separated role list, rejecting unknown roles.
pub fn parse_roles(raw: &str) -> anyhow::Result<Vec<String>> {
    let roles: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_uppercase)
        .collect();

    if roles.is_empty() {
        bail!("at least one role is required");
    }
    if let Some(unknown) = roles.iter().find(|r| !KNOWN_ROLES.contains(&r.as_str())) {
        bail!("unknown role {unknown:?}, expected one of {KNOWN_ROLES:?}");
    }
    Ok(roles)
}

/// Issues a long-lived token for `subject`, signed with `kid` or the active key.
pub fn tokengen(
    auth: &Authenticator,
    subject: &str,
    roles: &[String],
    kid: Option<&str>,
    ttl_hours: i64,
) -> anyhow::Result<String> {
    if ttl_hours <= 0 {
        bail!("ttl must be at least one hour");
    }

    let now = Utc::now();
    let claims = Claims::new(
        auth.issuer(),
        subject,
        roles.to_vec(),
        now,
        now + Duration::hours(ttl_hours),
    );

    let token = match kid {
        Some(kid) => auth.issue(kid, &claims)?,
        None => auth.issue_active(&claims)?,
    };
    Ok(token)
}

/// Wraps `token` in the markers scripts grep for.
pub fn token_block(token: &str) -> String {
    format!("------BEGIN TOKEN------\n{token}\n------END TOKEN------")
}

/// Inserts an ADMIN user and returns its id.
pub async fn create_admin(
    pool: &PgPool,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        bail!("name, email and password are required");
    }
    if !email.contains('@') {
        bail!("{email:?} is not a valid email address");
    }

    let password_hash = hash_password(password).map_err(|e| anyhow!("{e}"))?;
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (user_id, name, email, roles, password_hash, date_created, date_updated)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(name.trim())
    .bind(email.trim())
    .bind(vec![ROLE_ADMIN.to_string()])
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("inserting admin user")?;

    info!(user_id = %id, email = %email, "Admin user created");
    Ok(id)
}
