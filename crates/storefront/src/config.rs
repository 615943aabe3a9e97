//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_STOREFRONT_PRIVATE_TOKEN` - Storefront API private access token
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `SHOPIFY_STOREFRONT_ENDPOINT` - Override the GraphQL endpoint URL
//! - `SHOPIFY_REQUEST_TIMEOUT_SECS` - Storefront API timeout (default: 10)
//! - `CACHE_PROXY_URL` - Remote cache proxy; in-process cache when unset
//! - `CACHE_NAME` - Cache namespace at the proxy (default: storefront)
//! - `CACHE_MAX_CAPACITY` - In-process cache entries (default: 1000)
//! - `CACHE_PROXY_TIMEOUT_SECS` - Cache proxy timeout (default: 2)
//! - `CART_IDENTITY` - `cookie` or `session` (default: cookie)
//! - `CART_COOKIE_NAME` - Cart cookie name (default: cart)
//! - `CART_COOKIE_MAX_AGE_DAYS` - Cart cookie lifetime, 0 to 400 (default: 365)
//! - `CART_MUTATION_TIMEOUT_SECS` - Cart mutation timeout (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Public URL of the storefront.
    pub base_url: Url,
    /// Storefront API settings.
    pub shopify: ShopifyStorefrontConfig,
    /// Subrequest cache settings.
    pub cache: CacheConfig,
    /// Cart handling settings.
    pub cart: CartConfig,
    /// Sentry DSN.
    pub sentry_dsn: Option<String>,
    /// Sentry environment name.
    pub sentry_environment: Option<String>,
}

/// Shopify Storefront API configuration.
#[derive(Clone)]
pub struct ShopifyStorefrontConfig {
    /// Store domain (e.g. `orchard.myshopify.com`).
    pub store: String,
    /// API version (e.g. `2026-01`).
    pub api_version: String,
    /// Private access token for server-side requests.
    pub storefront_private_token: SecretString,
    /// GraphQL endpoint (`https://<store>/api/<version>/graphql.json` unless overridden).
    pub endpoint: Url,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ShopifyStorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyStorefrontConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("storefront_private_token", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ShopifyStorefrontConfig {
    /// Cache key namespace isolating this store and API version.
    #[must_use]
    pub fn cache_namespace(&self) -> String {
        format!("{}/{}", self.store, self.api_version)
    }
}

/// Subrequest cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Remote cache proxy; the in-process store is used when unset.
    pub proxy_url: Option<Url>,
    /// Cache namespace at the proxy.
    pub name: String,
    /// Maximum entries in the in-process store.
    pub max_capacity: u64,
    /// Timeout for each cache proxy request.
    pub proxy_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            name: "storefront".to_string(),
            max_capacity: 1000,
            proxy_timeout: Duration::from_secs(2),
        }
    }
}

/// Where the cart identity is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartIdentityStrategy {
    /// A dedicated `cart` cookie carrying the cart token.
    #[default]
    Cookie,
    /// The server-side session.
    Session,
}

impl FromStr for CartIdentityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cookie" => Ok(Self::Cookie),
            "session" => Ok(Self::Session),
            other => Err(format!("expected 'cookie' or 'session', got '{other}'")),
        }
    }
}

/// Cart cookie attributes.
#[derive(Debug, Clone)]
pub struct CartCookieConfig {
    /// Cookie name.
    pub name: String,
    /// Lifetime in days, refreshed on every write.
    pub max_age_days: i64,
    /// Send only over HTTPS.
    pub secure: bool,
}

impl Default for CartCookieConfig {
    fn default() -> Self {
        Self {
            name: "cart".to_string(),
            max_age_days: 365,
            secure: false,
        }
    }
}

/// Cart handling configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Identity persistence strategy.
    pub identity: CartIdentityStrategy,
    /// Cookie attributes for [`CartIdentityStrategy::Cookie`].
    pub cookie: CartCookieConfig,
    /// Upper bound on one cart mutation.
    pub mutation_timeout: Duration,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            identity: CartIdentityStrategy::Cookie,
            cookie: CartCookieConfig::default(),
            mutation_timeout: crate::cart::DEFAULT_MUTATION_TIMEOUT,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Source(&lookup);

        let base_url: Url = env.parse_required("STOREFRONT_BASE_URL")?;
        let secure = base_url.scheme() == "https";

        let store = env.required("SHOPIFY_STORE")?;
        let api_version = env.or_default("SHOPIFY_API_VERSION", "2026-01");
        let endpoint = match env.parse_optional("SHOPIFY_STOREFRONT_ENDPOINT")? {
            Some(url) => url,
            None => default_endpoint(&store, &api_version)?,
        };

        let shopify = ShopifyStorefrontConfig {
            store,
            api_version,
            storefront_private_token: env.validated_secret("SHOPIFY_STOREFRONT_PRIVATE_TOKEN")?,
            endpoint,
            request_timeout: Duration::from_secs(
                env.parse_or_default("SHOPIFY_REQUEST_TIMEOUT_SECS", 10)?,
            ),
        };

        let cache = CacheConfig {
            proxy_url: env.parse_optional("CACHE_PROXY_URL")?,
            name: env.or_default("CACHE_NAME", "storefront"),
            max_capacity: env.parse_or_default("CACHE_MAX_CAPACITY", 1000)?,
            proxy_timeout: Duration::from_secs(
                env.parse_or_default("CACHE_PROXY_TIMEOUT_SECS", 2)?,
            ),
        };

        let cart = CartConfig {
            identity: env.parse_or_default("CART_IDENTITY", CartIdentityStrategy::Cookie)?,
            cookie: CartCookieConfig {
                name: env.or_default("CART_COOKIE_NAME", "cart"),
                max_age_days: cookie_max_age_days(
                    env.parse_or_default("CART_COOKIE_MAX_AGE_DAYS", 365)?,
                )?,
                secure,
            },
            mutation_timeout: Duration::from_secs(
                env.parse_or_default("CART_MUTATION_TIMEOUT_SECS", 5)?,
            ),
        };

        Ok(Self {
            host: env.parse_or_default("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or_default("STOREFRONT_PORT", 3000)?,
            base_url,
            shopify,
            cache,
            cart,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with typed accessors.
struct Source<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Source<'_> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_optional<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| parse(key, &raw))
            .transpose()
    }

    fn parse_required<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        parse(key, &self.required(key)?)
    }

    fn parse_or_default<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_optional(key)?.unwrap_or(default))
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Storefront API endpoint of a store. The store must be a bare domain.
/// Longest cookie lifetime browsers honour.
const MAX_COOKIE_AGE_DAYS: i64 = 400;

fn cookie_max_age_days(days: i64) -> Result<i64, ConfigError> {
    if (0..=MAX_COOKIE_AGE_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError::InvalidEnvVar(
            "CART_COOKIE_MAX_AGE_DAYS".to_string(),
            format!("must be between 0 and {MAX_COOKIE_AGE_DAYS} days, got {days}"),
        ))
    }
}

fn default_endpoint(store: &str, api_version: &str) -> Result<Url, ConfigError> {
    let invalid = || {
        ConfigError::InvalidEnvVar(
            "SHOPIFY_STORE".to_string(),
            format!("'{store}' is not a bare store domain"),
        )
    };

    let url = Url::parse(&format!("https://{store}/api/{api_version}/graphql.json"))
        .map_err(|_| invalid())?;
    if url.host_str() != Some(store) {
        return Err(invalid());
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API tokens are random, so their entropy is high
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOKEN: &str = "shpat_8f3Kq9ZxL2mN7vB4cR1tY6wE0uI5oPa";

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_source(|key| vars.get(key).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("SHOPIFY_STORE", "orchard.myshopify.com"),
            ("SHOPIFY_STOREFRONT_PRIVATE_TOKEN", TOKEN),
        ]
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("abababab");
        assert!((entropy - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(TOKEN, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = load(&minimal()).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.shopify.api_version, "2026-01");
        assert_eq!(config.shopify.request_timeout, Duration::from_secs(10));
        assert!(config.cache.proxy_url.is_none());
        assert_eq!(config.cache.name, "storefront");
        assert_eq!(config.cache.max_capacity, 1000);
        assert_eq!(config.cart.identity, CartIdentityStrategy::Cookie);
        assert_eq!(config.cart.cookie.name, "cart");
        assert_eq!(config.cart.cookie.max_age_days, 365);
        assert!(!config.cart.cookie.secure);
        assert_eq!(config.cart.mutation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_endpoint_and_namespace() {
        let config = load(&minimal()).unwrap();
        assert_eq!(
            config.shopify.endpoint.as_str(),
            "https://orchard.myshopify.com/api/2026-01/graphql.json"
        );
        assert_eq!(config.shopify.cache_namespace(), "orchard.myshopify.com/2026-01");

        let mut vars = minimal();
        vars.push(("SHOPIFY_STOREFRONT_ENDPOINT", "http://127.0.0.1:9000/graphql"));
        let config = load(&vars).unwrap();
        assert_eq!(config.shopify.endpoint.as_str(), "http://127.0.0.1:9000/graphql");
    }

    #[test]
    fn test_https_base_url_makes_cookie_secure() {
        let mut vars = minimal();
        vars[0] = ("STOREFRONT_BASE_URL", "https://shop.example.com");
        assert!(load(&vars).unwrap().cart.cookie.secure);
    }

    #[test]
    fn test_overrides() {
        let mut vars = minimal();
        vars.extend([
            ("CACHE_PROXY_URL", "http://127.0.0.1:8787/"),
            ("CACHE_NAME", "orchard"),
            ("CART_IDENTITY", "Session"),
            ("CART_MUTATION_TIMEOUT_SECS", "2"),
            ("STOREFRONT_PORT", "8080"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(
            config.cache.proxy_url.as_ref().map(Url::as_str),
            Some("http://127.0.0.1:8787/")
        );
        assert_eq!(config.cache.name, "orchard");
        assert_eq!(config.cart.identity, CartIdentityStrategy::Session);
        assert_eq!(config.cart.mutation_timeout, Duration::from_secs(2));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_missing_required() {
        let err = load(&minimal()[..2]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SHOPIFY_STOREFRONT_PRIVATE_TOKEN"));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = minimal();
        vars.push(("STOREFRONT_PORT", "not-a-port"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(ref k, _)) if k == "STOREFRONT_PORT"));

        let mut vars = minimal();
        vars[1] = ("SHOPIFY_STORE", "orchard.myshopify.com/admin");
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(ref k, _)) if k == "SHOPIFY_STORE"));

        let mut vars = minimal();
        vars.push(("CART_IDENTITY", "jwt"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(ref k, _)) if k == "CART_IDENTITY"));
    }

    #[test]
    fn test_cookie_max_age_bounds() {
        for days in ["-1", "401", "9223372036854775807"] {
            let mut vars = minimal();
            vars.push(("CART_COOKIE_MAX_AGE_DAYS", days));
            let err = load(&vars).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "CART_COOKIE_MAX_AGE_DAYS"),
                "{days} should be rejected"
            );
        }

        for (raw, days) in [("0", 0), ("400", 400)] {
            let mut vars = minimal();
            vars.push(("CART_COOKIE_MAX_AGE_DAYS", raw));
            assert_eq!(load(&vars).unwrap().cart.cookie.max_age_days, days);
        }
    }

    #[test]
    fn test_shopify_config_debug_redacts_secrets() {
        let config = load(&minimal()).unwrap();
        let debug_output = format!("{:?}", config.shopify);

        assert!(debug_output.contains("orchard.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(TOKEN));
    }
}
