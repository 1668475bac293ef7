use std::env;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_SUPABASE_URL: &str = "https://ibembkohihvrhrgefequ.supabase.co";
const DEFAULT_SUPABASE_KEY: &str = "sb_publishable_V9m3Z20nTBNv1he4ZKTtAw_C4RdTNiQ";
const DEFAULT_SUPABASE_BUCKET: &str = "cafe";

/// Base URL of the food-ordering backend.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let base_url = env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Supabase Storage endpoint, key and the bucket this console manages.
///
/// Photos whose URLs fall outside `url` + `bucket` are treated as external
/// and never touched.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub api_key: String,
    pub bucket: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let url = env::var("SUPABASE_URL").unwrap_or_else(|_| DEFAULT_SUPABASE_URL.into());
        let api_key = env::var("SUPABASE_ANON_KEY")
            .or_else(|_| env::var("SUPABASE_KEY"))
            .unwrap_or_else(|_| DEFAULT_SUPABASE_KEY.into());
        let bucket =
            env::var("SUPABASE_BUCKET").unwrap_or_else(|_| DEFAULT_SUPABASE_BUCKET.into());
        Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            bucket,
        }
    }
}

#[cfg(test)]
pub fn test_storage_config() -> StorageConfig {
    StorageConfig {
        url: "https://unit.supabase.co".into(),
        api_key: "test-key".into(),
        bucket: "cafe".into(),
    }
}
