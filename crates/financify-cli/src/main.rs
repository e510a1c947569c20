use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use financify_auth::Authenticator;
use financify_cli::{
    DEFAULT_TOKEN_TTL_HOURS, create_admin, keygen, parse_roles, token_block, tokengen,
};
use financify_config::{AuthConfig, DatabaseConfig};
use financify_db::{PgPool, init_db_pool, migrate};

#[derive(Parser)]
#[command(name = "financify-cli")]
#[command(about = "Financify CLI - Administrative tools for Financify", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 signing key
    Keygen {
        /// Directory the key is written to
        #[arg(short = 'd', long, default_value = "keys")]
        dir: PathBuf,

        /// Key id; the file is named `<kid>.pem` (defaults to a random UUID)
        #[arg(short = 'k', long)]
        kid: Option<String>,
    },
    /// Issue a token from the configured key set
    Tokengen {
        /// Token subject, usually a user id
        #[arg(short = 's', long)]
        subject: String,

        /// Comma separated roles, e.g. ADMIN,USER
        #[arg(short = 'r', long)]
        roles: String,

        /// Signing key id (defaults to the active key)
        #[arg(short = 'k', long)]
        kid: Option<String>,

        /// Lifetime in hours
        #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_HOURS)]
        ttl_hours: i64,
    },
    /// Apply database migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin {
        /// Display name
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Email address
        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Password (will be prompted securely if not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "financify=info,financify_cli=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { dir, kid } => {
            let path = keygen(&dir, kid.as_deref())?;
            println!("✅ Private key written to {}", path.display());
        }
        Commands::Tokengen {
            subject,
            roles,
            kid,
            ttl_hours,
        } => {
            let roles = parse_roles(&roles)?;
            let config = AuthConfig::from_env();
            let auth = Authenticator::from_config(&config).with_context(|| {
                format!("loading signing keys from {}", config.keys_dir.display())
            })?;
            let token = tokengen(&auth, &subject, &roles, kid.as_deref(), ttl_hours)?;
            println!("{}", token_block(&token));
        }
        Commands::Migrate => {
            let pool = connect().await?;
            migrate(&pool).await.context("applying migrations")?;
            println!("✅ Database migration complete");
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => {
            let name = match name {
                Some(name) => name,
                None => Input::<String>::new().with_prompt("Name").interact_text()?,
            };
            let email = match email {
                Some(email) => email,
                None => Input::<String>::new().with_prompt("Email address").interact_text()?,
            };
            let password = match password {
                Some(password) => password,
                None => Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Confirm password", "Passwords don't match")
                    .interact()?,
            };

            let pool = connect().await?;
            let id = create_admin(&pool, &name, &email, &password).await?;
            println!("\n✅ Admin created successfully!");
            println!("   ID: {}", id);
            println!("   Email: {}", email);
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let config = DatabaseConfig::from_env();
    let pool = init_db_pool(&config).context("configuring database pool")?;
    financify_db::status_check(&pool)
        .await
        .context("connecting to database")?;
    Ok(pool)
}
