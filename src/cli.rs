//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::audit::{ActivityRecorder, NewActivity, RequestOrigin};
use crate::db::{Database, NewUser, Role};
use crate::jwt::TokenService;
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header to read the client IP from when behind a reverse proxy.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    #[value(name = "x-forwarded-for")]
    XForwardedFor,
    #[value(name = "x-real-ip")]
    XRealIp,
}

impl ClientIpHeader {
    pub fn header_name(&self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "clinicgate",
    about = "Token authentication gate and activity log for the clinic API"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "clinicgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Role given to users created without an explicit role
    #[arg(long, env = "DEFAULT_ROLE", default_value = "staff", value_parser = parse_role)]
    pub default_role: Role,

    /// Read the client IP from this header instead of the socket address
    #[arg(long)]
    pub ip_header: Option<ClientIpHeader>,

    /// Create an active user on startup and print tokens for it
    #[arg(long, value_name = "USERNAME")]
    pub create_user: Option<String>,

    /// Email for --create-user
    #[arg(long, requires = "create_user")]
    pub email: Option<String>,

    /// Role for --create-user (defaults to --default-role)
    #[arg(long, requires = "create_user", value_parser = parse_role)]
    pub role: Option<Role>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded. There is
/// no built-in fallback secret.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// A user created from the command line, with tokens ready to use.
#[derive(Debug)]
pub struct CreatedUser {
    pub id: i64,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
}

/// Insert an active user, record the creation with no actor, and issue tokens.
pub async fn create_user_with_tokens(
    db: &Database,
    tokens: &TokenService,
    username: &str,
    email: Option<&str>,
    role: Role,
) -> Result<CreatedUser, String> {
    let id = db
        .users()
        .create(&NewUser {
            username,
            email,
            role,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("Failed to create user: {}", e))?;

    ActivityRecorder::new(db.clone())
        .record(
            None,
            &RequestOrigin::system("clinicgate-cli"),
            NewActivity::new("CREATE")
                .entity("user", id)
                .details(&json!({ "username": username, "role": role })),
        )
        .await;

    let access = tokens
        .issue_access_token(id, role)
        .map_err(|e| format!("Failed to issue access token: {}", e))?;
    let refresh = tokens
        .issue_refresh_token(id)
        .map_err(|e| format!("Failed to issue refresh token: {}", e))?;

    Ok(CreatedUser {
        id,
        role,
        access_token: access.token,
        refresh_token: refresh.token,
    })
}

/// Handle the --create-user flag: create the user and print its tokens.
pub async fn handle_create_user(
    db: &Database,
    jwt_secret: &[u8],
    username: &str,
    email: Option<&str>,
    role: Role,
) {
    let tokens = TokenService::new(jwt_secret);
    match create_user_with_tokens(db, &tokens, username, email, role).await {
        Ok(created) => {
            println!();
            println!("User created: {} (id {}, role {})", username, created.id, created.role);
            println!("Access token: {}", created.access_token);
            println!("Refresh token: {}", created.refresh_token);
            println!();
        }
        Err(e) => {
            error!(username = %username, error = %e, "Failed to create user");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    ip_header: Option<ClientIpHeader>,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        ip_header,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
