use std::{env, path::PathBuf, time::Duration};

/// AppConfig
///
/// Holds the server's entire configuration state. Immutable once loaded and pulled into
/// handlers and extractors through `FromRef`, like the rest of the unified state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory repository (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // HS256 secret used to sign and verify access/refresh tokens.
    pub jwt_secret: String,
    // Lifetime of an access token, in seconds.
    pub access_token_ttl_secs: i64,
    // Lifetime of a refresh token, in seconds. Refresh tokens are issued but never rotated.
    pub refresh_token_ttl_secs: i64,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Optional first administrator, created at startup when absent.
    pub bootstrap_admin: Option<BootstrapAdmin>,
    // Argon2 memory cost in KiB.
    pub password_hash_memory_kib: u32,
    // Argon2 time cost (passes).
    pub password_hash_iterations: u32,
}

/// Env
///
/// Runtime context: `Local` tolerates missing secrets and a missing database,
/// `Production` refuses to start without them.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Credentials of the superuser seeded at startup.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

const LOCAL_JWT_SECRET: &str = "local-development-jwt-secret-change-me";
const DEFAULT_ACCESS_TTL_SECS: i64 = 300;
const DEFAULT_REFRESH_TTL_SECS: i64 = 86_400;
// Argon2id defaults recommended by the argon2 crate.
const DEFAULT_HASH_MEMORY_KIB: u32 = 19_456;
const DEFAULT_HASH_ITERATIONS: u32 = 2;

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for tests: in-memory repository, a fixed
    /// secret and a deliberately cheap password hash so suites stay fast.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: "access-portal-test-secret".to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            bind_addr: "127.0.0.1:0".to_string(),
            bootstrap_admin: None,
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables (call `dotenv` first).
    ///
    /// # Panics
    /// Panics in `Production` when `DATABASE_URL` or `JWT_SECRET` is missing, and in any
    /// environment when a numeric variable does not parse. The service must not start
    /// with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()).as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
            ),
            Env::Local => env::var("DATABASE_URL").ok(),
        };

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Self {
            db_url,
            env,
            jwt_secret,
            access_token_ttl_secs: numeric_var("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS),
            refresh_token_ttl_secs: numeric_var("REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            bootstrap_admin,
            password_hash_memory_kib: numeric_var(
                "PASSWORD_HASH_MEMORY_KIB",
                DEFAULT_HASH_MEMORY_KIB,
            ),
            password_hash_iterations: numeric_var(
                "PASSWORD_HASH_ITERATIONS",
                DEFAULT_HASH_ITERATIONS,
            ),
        }
    }
}

/// ClientConfig
///
/// Settings for the client half: where the API lives, how long a call may take before
/// it counts as "no response", and where the credential pair is persisted.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    // `None` keeps the credential pair in memory only.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Reads `PORTAL_API_URL`, `PORTAL_REQUEST_TIMEOUT_SECS` and `PORTAL_SESSION_FILE`,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("PORTAL_API_URL").unwrap_or(defaults.base_url),
            request_timeout: env::var("PORTAL_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            session_file: env::var("PORTAL_SESSION_FILE").ok().map(PathBuf::from),
        }
    }
}

fn numeric_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}
