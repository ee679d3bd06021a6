//! 员工操作权限码（由身份服务签发在 token 中）。

pub const DEVICE_READ: &str = "DEVICE.READ";
pub const DEVICE_MANAGE: &str = "DEVICE.MANAGE";
pub const CREDENTIAL_READ: &str = "CREDENTIAL.READ";
pub const CREDENTIAL_MANAGE: &str = "CREDENTIAL.MANAGE";
pub const QUEUE_READ: &str = "QUEUE.READ";
pub const QUEUE_OPERATE: &str = "QUEUE.OPERATE";
pub const CHECKIN_READ: &str = "CHECKIN.READ";
pub const WAYFINDING_OPERATE: &str = "WAYFINDING.OPERATE";
pub const EVENTS_SUBSCRIBE: &str = "EVENTS.SUBSCRIBE";
pub const METRICS_READ: &str = "METRICS.READ";

/// 全部权限码（用于管理员 token 与测试）。
pub const ALL: &[&str] = &[
    DEVICE_READ,
    DEVICE_MANAGE,
    CREDENTIAL_READ,
    CREDENTIAL_MANAGE,
    QUEUE_READ,
    QUEUE_OPERATE,
    CHECKIN_READ,
    WAYFINDING_OPERATE,
    EVENTS_SUBSCRIBE,
    METRICS_READ,
];
