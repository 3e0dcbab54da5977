use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Only needed by the maintenance loop, which runs without a user token.
    pub supabase_service_role_key: Option<String>,
    /// The project's JWT secret. Session tokens are signed with it so the
    /// database accepts them.
    pub supabase_jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub server_port: u16,
    /// Offset of the clinic's wall clock from UTC. Appointment dates and times
    /// and business-day counting are expressed in this offset.
    pub clinic_utc_offset_minutes: i32,
    pub inactivation_window_business_days: u32,
    pub maintenance_interval_secs: u64,
    pub password_reset_redirect_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY").ok()
                .filter(|key| !key.is_empty()),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24),
            server_port: parse_or("SERVER_PORT", 3000),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", -180),
            inactivation_window_business_days: parse_or("INACTIVATION_WINDOW_BUSINESS_DAYS", 5),
            maintenance_interval_secs: parse_or("MAINTENANCE_INTERVAL_SECS", 300),
            password_reset_redirect_url: env::var("PASSWORD_RESET_REDIRECT_URL").ok()
                .filter(|url| !url.is_empty()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_maintenance_enabled(&self) -> bool {
        self.supabase_service_role_key.is_some() && self.maintenance_interval_secs > 0
    }
}

fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
