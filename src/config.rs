use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Tenant used for widget requests that don't name one.
    pub business_id: String,
    pub business_name: String,
    pub owner_email: String,
    pub gateway_url: String,
    pub gateway_api_key: String,
    pub gateway_model: String,
    pub email_api_key: String,
    pub email_from: String,
    /// Origin allowed to embed the chat widget. Empty = allow any.
    pub widget_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "frontdesk.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            business_id: env::var("BUSINESS_ID").unwrap_or_else(|_| "default".to_string()),
            business_name: env::var("BUSINESS_NAME").unwrap_or_default(),
            owner_email: env::var("OWNER_EMAIL").unwrap_or_default(),
            gateway_url: env::var("GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai".to_string()),
            gateway_api_key: env::var("GATEWAY_API_KEY").unwrap_or_default(),
            gateway_model: env::var("GATEWAY_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "bookings@frontdesk.local".to_string()),
            widget_origin: env::var("WIDGET_ORIGIN").unwrap_or_default(),
        }
    }
}
