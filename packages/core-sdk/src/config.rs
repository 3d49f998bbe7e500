use std::path::PathBuf;

use thiserror::Error;

use crate::models::UpstreamConfig;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/**
 * \brief 跨域白名单：任意来源或显式列表。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /**
     * \brief 解析 "*" 或逗号分隔的来源列表。
     */
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }
        let mut origins = Vec::new();
        for part in trimmed.split(',') {
            let origin = part.trim();
            if origin.is_empty() {
                continue;
            }
            if origin == "*" {
                return Err(ConfigError::Invalid {
                    key: "GOALCRAFT_ALLOWED_ORIGINS",
                    reason: "\"*\" cannot be combined with explicit origins".to_string(),
                });
            }
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    key: "GOALCRAFT_ALLOWED_ORIGINS",
                    reason: format!("origin {} must start with http:// or https://", origin),
                });
            }
            origins.push(origin.trim_end_matches('/').to_string());
        }
        if origins.is_empty() {
            return Err(ConfigError::Invalid {
                key: "GOALCRAFT_ALLOWED_ORIGINS",
                reason: "no origins listed".to_string(),
            });
        }
        Ok(Self::List(origins))
    }
}

/**
 * \brief 进程级配置，启动时一次性加载后只读共享。
 */
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: String,
    pub upstream: UpstreamConfig,
    pub allowed_origins: AllowedOrigins,
    /** \brief 可选的静态前端目录 */
    pub ui_dir: Option<PathBuf>,
    pub telemetry_enabled: bool,
    pub log_dir: PathBuf,
}

impl AppConfig {
    /**
     * \brief 从进程环境变量加载配置。
     */
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * \brief 从任意键值来源加载配置，便于测试注入。
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GROQ_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("GROQ_API_KEY"))?;

        let url = match lookup("GROQ_URL") {
            Some(v) => v.trim().to_string(),
            None => DEFAULT_UPSTREAM_URL.to_string(),
        };
        if url.is_empty() {
            return Err(ConfigError::Missing("GROQ_URL"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "GROQ_URL",
                reason: format!("{} is not an http(s) url", url),
            });
        }

        let model = lookup("GROQ_MODEL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_ms = match lookup("GOALCRAFT_TIMEOUT_MS") {
            Some(v) => parse_timeout(&v)?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let allowed_origins = match lookup("GOALCRAFT_ALLOWED_ORIGINS") {
            Some(v) => AllowedOrigins::parse(&v)?,
            None => AllowedOrigins::Any,
        };

        let addr = lookup("GOALCRAFT_ADDR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let ui_dir = lookup("GOALCRAFT_UI_DIR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let telemetry_enabled = match lookup("GOALCRAFT_TELEMETRY") {
            Some(v) => parse_bool("GOALCRAFT_TELEMETRY", &v)?,
            None => false,
        };

        let log_dir = lookup("GOALCRAFT_LOG_DIR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"));

        Ok(Self {
            addr,
            upstream: UpstreamConfig {
                url,
                api_key,
                model,
                timeout_ms,
            },
            allowed_origins,
            ui_dir,
            telemetry_enabled,
            log_dir,
        })
    }
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::Invalid {
            key: "GOALCRAFT_TIMEOUT_MS",
            reason: e.to_string(),
        })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key: "GOALCRAFT_TIMEOUT_MS",
            reason: "timeout must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("{} is not a boolean", other),
        }),
    }
}
