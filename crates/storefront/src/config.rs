//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `DEFAULT_CURRENCY` - Order currency when the cart does not name one (default: USD)
//! - `CHECKOUT_PRICE_POLICY` - `verify_catalog` (default) or `trust_cart`
//! - `LOG_FORMAT` - `pretty` (default) or `json`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## Optional (card network - Stripe)
//! - `STRIPE_SECRET_KEY` - API secret key
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret (`whsec_...`)
//! - `STRIPE_MONTHLY_PRICE_ID` / `STRIPE_ANNUAL_PRICE_ID` - Membership price IDs
//! - `STRIPE_API_BASE` - API base URL (default: <https://api.stripe.com>)
//!
//! ## Optional (regional processor - Paystack)
//! - `PAYSTACK_SECRET_KEY` - API secret key, also the webhook HMAC key
//! - `PAYSTACK_CURRENCY` - Settlement currency (default: GHS)
//! - `PAYSTACK_USD_RATE` - Site price to local currency rate (default: 1)
//! - `PAYSTACK_MONTHLY_PLAN_CODE` / `PAYSTACK_ANNUAL_PLAN_CODE` - Membership plan codes
//! - `PAYSTACK_API_BASE` - API base URL (default: <https://api.paystack.co>)
//!
//! ## Optional (order confirmation email)
//! - `SMTP_HOST`, `SMTP_PORT` (default 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `EMAIL_FROM` - Sender address (default: orders@streetmerch.shop)
//!
//! ## Optional (content management gate)
//! - `ADMIN_PASSWORD` - Shared admin secret
//! - `ADMIN_EMAIL` - Admin identity email
//!
//! Payment credentials are optional at startup. A checkout against a provider
//! whose credentials are missing fails with an actionable configuration error
//! before any network call is made.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use streetmerch_core::{BillingCycle, CurrencyCode};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_PAYSTACK_API_BASE: &str = "https://api.paystack.co";
const DEFAULT_EMAIL_FROM: &str = "orders@streetmerch.shop";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Whether checkout trusts the cart's line prices or re-reads the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricePolicy {
    /// Reject a checkout whose line prices differ from the live catalog.
    #[default]
    VerifyCatalog,
    /// Charge whatever unit prices the client sent.
    TrustCart,
}

impl FromStr for PricePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_catalog" => Ok(Self::VerifyCatalog),
            "trust_cart" => Ok(Self::TrustCart),
            _ => Err(format!("expected verify_catalog or trust_cart, got {s}")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Currency recorded on orders when none is supplied
    pub default_currency: CurrencyCode,
    /// Checkout price trust boundary
    pub price_policy: PricePolicy,
    /// Card-network provider configuration
    pub stripe: StripeConfig,
    /// Regional processor configuration
    pub paystack: PaystackConfig,
    /// SMTP configuration (order confirmations are skipped when absent)
    pub email: Option<EmailConfig>,
    /// Content management gate
    pub admin: AdminConfig,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// API base URL
    pub api_base: String,
    /// API secret key
    pub secret_key: Option<SecretString>,
    /// Webhook signing secret
    pub webhook_secret: Option<SecretString>,
    /// Membership price ID for monthly billing
    pub monthly_price_id: Option<String>,
    /// Membership price ID for annual billing
    pub annual_price_id: Option<String>,
    /// Charge currency
    pub currency: CurrencyCode,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &redacted(self.secret_key.as_ref()))
            .field("webhook_secret", &redacted(self.webhook_secret.as_ref()))
            .field("monthly_price_id", &self.monthly_price_id)
            .field("annual_price_id", &self.annual_price_id)
            .field("currency", &self.currency)
            .finish()
    }
}

impl StripeConfig {
    /// Price ID for a billing cycle, if configured.
    #[must_use]
    pub fn price_id(&self, cycle: BillingCycle) -> Option<&str> {
        match cycle {
            BillingCycle::Monthly => self.monthly_price_id.as_deref(),
            BillingCycle::Annual => self.annual_price_id.as_deref(),
        }
    }
}

/// Paystack configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct PaystackConfig {
    /// API base URL
    pub api_base: String,
    /// API secret key (also signs webhooks)
    pub secret_key: Option<SecretString>,
    /// Settlement currency
    pub currency: CurrencyCode,
    /// Multiplier from site prices to the settlement currency
    pub usd_rate: Decimal,
    /// Membership plan code for monthly billing
    pub monthly_plan_code: Option<String>,
    /// Membership plan code for annual billing
    pub annual_plan_code: Option<String>,
}

impl std::fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &redacted(self.secret_key.as_ref()))
            .field("currency", &self.currency)
            .field("usd_rate", &self.usd_rate)
            .field("monthly_plan_code", &self.monthly_plan_code)
            .field("annual_plan_code", &self.annual_plan_code)
            .finish()
    }
}

impl PaystackConfig {
    /// Plan code for a billing cycle, if configured.
    #[must_use]
    pub fn plan_code(&self, cycle: BillingCycle) -> Option<&str> {
        match cycle {
            BillingCycle::Monthly => self.monthly_plan_code.as_deref(),
            BillingCycle::Annual => self.annual_plan_code.as_deref(),
        }
    }
}

/// SMTP email configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Content management gate.
#[derive(Clone, Default)]
pub struct AdminConfig {
    /// Shared admin secret
    pub password: Option<SecretString>,
    /// Admin identity email
    pub email: Option<String>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("password", &redacted(self.password.as_ref()))
            .field("email", &self.email)
            .finish()
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        let default_currency: CurrencyCode = parse_env("DEFAULT_CURRENCY", "USD")?;
        let price_policy = parse_env("CHECKOUT_PRICE_POLICY", "verify_catalog")?;
        let log_format = match get_env_or_default("LOG_FORMAT", "pretty").as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            default_currency,
            price_policy,
            stripe: StripeConfig::from_env(default_currency)?,
            paystack: PaystackConfig::from_env()?,
            email: EmailConfig::from_env()?,
            admin: AdminConfig::from_env()?,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Defaults for tests and local demos: no provider credentials, no email,
    /// providers pointed at the real API hosts.
    #[must_use]
    pub fn local(base_url: &str) -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/streetmerch"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: base_url.to_owned(),
            default_currency: CurrencyCode::USD,
            price_policy: PricePolicy::default(),
            stripe: StripeConfig {
                api_base: DEFAULT_STRIPE_API_BASE.to_owned(),
                secret_key: None,
                webhook_secret: None,
                monthly_price_id: None,
                annual_price_id: None,
                currency: CurrencyCode::USD,
            },
            paystack: PaystackConfig {
                api_base: DEFAULT_PAYSTACK_API_BASE.to_owned(),
                secret_key: None,
                currency: CurrencyCode::GHS,
                usd_rate: Decimal::ONE,
                monthly_plan_code: None,
                annual_plan_code: None,
            },
            email: None,
            admin: AdminConfig::default(),
            log_format: LogFormat::Pretty,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl StripeConfig {
    fn from_env(currency: CurrencyCode) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE),
            secret_key: get_optional_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_optional_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            monthly_price_id: get_optional_env("STRIPE_MONTHLY_PRICE_ID"),
            annual_price_id: get_optional_env("STRIPE_ANNUAL_PRICE_ID"),
            currency,
        })
    }
}

impl PaystackConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("PAYSTACK_API_BASE", DEFAULT_PAYSTACK_API_BASE),
            secret_key: get_optional_validated_secret("PAYSTACK_SECRET_KEY")?,
            currency: parse_env("PAYSTACK_CURRENCY", "GHS")?,
            usd_rate: parse_usd_rate(&get_env_or_default("PAYSTACK_USD_RATE", "1"))?,
            monthly_plan_code: get_optional_env("PAYSTACK_MONTHLY_PLAN_CODE"),
            annual_plan_code: get_optional_env("PAYSTACK_ANNUAL_PLAN_CODE"),
        })
    }
}

impl EmailConfig {
    /// Email is enabled only when `SMTP_HOST` is set.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_env_or_default("EMAIL_FROM", DEFAULT_EMAIL_FROM),
        }))
    }
}

impl AdminConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            password: get_optional_validated_secret("ADMIN_PASSWORD")?,
            email: get_optional_env("ADMIN_EMAIL").map(|e| e.to_lowercase()),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn redacted(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() { "[REDACTED]" } else { "None" }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the Paystack exchange rate. Must be a positive decimal.
fn parse_usd_rate(raw: &str) -> Result<Decimal, ConfigError> {
    let rate = raw.trim().parse::<Decimal>().map_err(|e| {
        ConfigError::InvalidEnvVar("PAYSTACK_USD_RATE".to_string(), e.to_string())
    })?;
    if rate <= Decimal::ZERO {
        return Err(ConfigError::InvalidEnvVar(
            "PAYSTACK_USD_RATE".to_string(),
            format!("must be greater than zero (got {rate})"),
        ));
    }
    Ok(rate)
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

/// Load and validate an optional secret from environment.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_secret_strength(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_stripe_config() -> StripeConfig {
        StripeConfig {
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            secret_key: Some(SecretString::from("sk_test_super_secret_value")),
            webhook_secret: Some(SecretString::from("whsec_super_secret_value")),
            monthly_price_id: Some("price_monthly".to_string()),
            annual_price_id: None,
            currency: CurrencyCode::USD,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_provider_key() {
        let result = validate_secret_strength("sk_live_51Hq8ZkLm3Np7Rt2Vw9Xy", "STRIPE_SECRET_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_usd_rate() {
        assert_eq!(parse_usd_rate("15.5").unwrap(), Decimal::new(155, 1));
        assert_eq!(parse_usd_rate(" 1 ").unwrap(), Decimal::ONE);
        assert!(parse_usd_rate("0").is_err());
        assert!(parse_usd_rate("-2").is_err());
        assert!(parse_usd_rate("abc").is_err());
    }

    #[test]
    fn test_price_policy_parse() {
        assert_eq!(
            "trust_cart".parse::<PricePolicy>().unwrap(),
            PricePolicy::TrustCart
        );
        assert_eq!(PricePolicy::default(), PricePolicy::VerifyCatalog);
        assert!("sometimes".parse::<PricePolicy>().is_err());
    }

    #[test]
    fn test_stripe_price_id_by_cycle() {
        let config = test_stripe_config();
        assert_eq!(config.price_id(BillingCycle::Monthly), Some("price_monthly"));
        assert_eq!(config.price_id(BillingCycle::Annual), None);
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_stripe_config());

        assert!(debug_output.contains("price_monthly"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_super_secret_value"));
        assert!(!debug_output.contains("whsec_super_secret_value"));
    }
}
