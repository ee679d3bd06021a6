//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// LED 段命令的下发通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedTransport {
    /// 直接调用控制器 WLED JSON API。
    Http,
    /// 经命令总线发布到 `practice/{id}/led/{controller}/command`。
    Bus,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub jwt_secret: String,
    pub credential_encryption_key: String,
    pub credential_lookup_key: String,
    pub mqtt_enabled: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_root: String,
    pub mqtt_qos: u8,
    pub mqtt_reconnect_initial_ms: u64,
    pub mqtt_reconnect_max_ms: u64,
    pub mqtt_request_capacity: usize,
    pub mqtt_publish_timeout_ms: u64,
    pub led_transport: LedTransport,
    pub led_http_timeout_ms: u64,
    pub ticket_min_wait_minutes: u32,
    pub default_utc_offset_minutes: i32,
    pub ws_heartbeat_seconds: u64,
    pub ws_client_buffer: usize,
    pub wait_time_interval_seconds: u64,
    pub device_offline_after_seconds: u64,
    pub push_webhook_url: Option<String>,
    pub push_webhook_secret: Option<String>,
    pub fixture_path: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = read_required("RECEPTION_JWT_SECRET")?;
        let credential_encryption_key = read_required("RECEPTION_CREDENTIAL_ENCRYPTION_KEY")?;
        let credential_lookup_key = read_required("RECEPTION_CREDENTIAL_LOOKUP_KEY")?;
        let http_addr =
            env::var("RECEPTION_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let mqtt_enabled = read_bool_with_default("RECEPTION_MQTT", false);
        let mqtt_host = env::var("RECEPTION_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_with_default::<u16>("RECEPTION_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("RECEPTION_MQTT_USERNAME");
        let mqtt_password = read_optional("RECEPTION_MQTT_PASSWORD");
        let mqtt_topic_root = env::var("RECEPTION_MQTT_TOPIC_ROOT")
            .map(|value| value.trim_matches('/').to_string())
            .unwrap_or_else(|_| "practice".to_string());
        let mqtt_qos = read_with_default::<u8>("RECEPTION_MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "RECEPTION_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let mqtt_reconnect_initial_ms =
            read_with_default::<u64>("RECEPTION_MQTT_RECONNECT_INITIAL_MS", 5_000)?;
        let mqtt_reconnect_max_ms =
            read_with_default::<u64>("RECEPTION_MQTT_RECONNECT_MAX_MS", 60_000)?;
        let mqtt_request_capacity =
            read_with_default::<usize>("RECEPTION_MQTT_REQUEST_CAPACITY", 64)?;
        let mqtt_publish_timeout_ms =
            read_with_default::<u64>("RECEPTION_MQTT_PUBLISH_TIMEOUT_MS", 2_000)?;
        let led_transport = read_led_transport("RECEPTION_LED_TRANSPORT")?;
        let led_http_timeout_ms = read_with_default::<u64>("RECEPTION_LED_HTTP_TIMEOUT_MS", 5_000)?;
        let ticket_min_wait_minutes =
            read_with_default::<u32>("RECEPTION_TICKET_MIN_WAIT_MINUTES", 5)?;
        let default_utc_offset_minutes =
            read_with_default::<i32>("RECEPTION_DEFAULT_UTC_OFFSET_MINUTES", 60)?;
        if default_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(
                "RECEPTION_DEFAULT_UTC_OFFSET_MINUTES".to_string(),
                default_utc_offset_minutes.to_string(),
            ));
        }
        let ws_heartbeat_seconds = read_with_default::<u64>("RECEPTION_WS_HEARTBEAT_SECONDS", 30)?;
        let ws_client_buffer = read_with_default::<usize>("RECEPTION_WS_CLIENT_BUFFER", 64)?;
        let wait_time_interval_seconds =
            read_with_default::<u64>("RECEPTION_WAIT_TIME_INTERVAL_SECONDS", 60)?;
        let device_offline_after_seconds =
            read_with_default::<u64>("RECEPTION_DEVICE_OFFLINE_AFTER_SECONDS", 120)?;
        let push_webhook_url = read_optional("RECEPTION_PUSH_WEBHOOK_URL");
        let push_webhook_secret = read_optional("RECEPTION_PUSH_WEBHOOK_SECRET");
        let fixture_path = read_optional("RECEPTION_FIXTURE_PATH");

        Ok(Self {
            http_addr,
            jwt_secret,
            credential_encryption_key,
            credential_lookup_key,
            mqtt_enabled,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_root,
            mqtt_qos,
            mqtt_reconnect_initial_ms,
            mqtt_reconnect_max_ms,
            mqtt_request_capacity: mqtt_request_capacity.max(1),
            mqtt_publish_timeout_ms,
            led_transport,
            led_http_timeout_ms,
            ticket_min_wait_minutes,
            default_utc_offset_minutes,
            ws_heartbeat_seconds,
            ws_client_buffer: ws_client_buffer.max(1),
            wait_time_interval_seconds,
            device_offline_after_seconds,
            push_webhook_url,
            push_webhook_secret,
            fixture_path,
        })
    }
}

fn read_required(key: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key.to_string())),
    }
}

fn read_with_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}

fn read_led_transport(key: &str) -> Result<LedTransport, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(LedTransport::Http),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "http" | "" => Ok(LedTransport::Http),
            "bus" | "mqtt" => Ok(LedTransport::Bus),
            _ => Err(ConfigError::Invalid(key.to_string(), value)),
        },
    }
}
