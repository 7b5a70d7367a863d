use serde::Deserialize;

/// Settings read from `STATIC_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct StaticSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
    /// Directory media files are written under
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Upper bound for both the upload and the stored file, in bytes
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8013".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9013".to_string()
}

fn default_base_path() -> String {
    "./static".to_string()
}

fn default_max_size() -> usize {
    10 * 1024 * 1024
}
