use serde::Deserialize;

/// Settings read from `SURVEY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct SurveySettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8014".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9014".to_string()
}
