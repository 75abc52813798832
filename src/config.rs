use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// SMTP account used for guide notifications and OTP delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub from_name: String,
}

/// OpenAI-compatible chat completion endpoint (Groq by default).
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: Option<MailConfig>,
    pub llm: Option<LlmConfig>,
    pub geocoding: Option<GeocodingConfig>,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "churuli".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "churuli-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };

        let mail = match (non_empty_var("EMAIL_USER"), non_empty_var("EMAIL_PASS")) {
            (Some(username), Some(password)) => Some(MailConfig {
                smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
                username,
                password,
                from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "Churuli".into()),
            }),
            _ => None,
        };

        let llm = non_empty_var("GROQ_API_KEY").map(|api_key| LlmConfig {
            api_key,
            model: std::env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant".into()),
            base_url: std::env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".into()),
        });

        let geocoding = non_empty_var("MAPTILER_API_KEY").map(|api_key| GeocodingConfig {
            api_key,
            base_url: std::env::var("MAPTILER_BASE_URL")
                .unwrap_or_else(|_| "https://api.maptiler.com/geocoding".into()),
        });

        let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Self {
            database_url,
            jwt,
            mail,
            llm,
            geocoding,
            http_timeout_secs,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
