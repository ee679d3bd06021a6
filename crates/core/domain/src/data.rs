//! 领域枚举：设备、区域、灯段、凭证、票据与签到方式。

/// 设备类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    Reader,
    LightingController,
    Display,
    Kiosk,
}

impl DeviceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::LightingController => "lighting_controller",
            Self::Display => "display",
            Self::Kiosk => "kiosk",
        }
    }

    /// 命令总线 topic 中的类别段。
    pub fn topic_segment(self) -> &'static str {
        match self {
            Self::Reader => "nfc",
            Self::LightingController => "led",
            Self::Display => "display",
            Self::Kiosk => "kiosk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reader" | "nfc_reader" | "nfc" => Some(Self::Reader),
            "lighting_controller" | "led_controller" | "led" => Some(Self::LightingController),
            "display" => Some(Self::Display),
            "kiosk" => Some(Self::Kiosk),
            _ => None,
        }
    }
}

/// 设备在线状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "error" => Some(Self::Error),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// 区域类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneType {
    Entrance,
    Corridor,
    Waiting,
    Room,
}

impl ZoneType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entrance => "entrance",
            Self::Corridor => "corridor",
            Self::Waiting => "waiting",
            Self::Room => "room",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entrance" => Some(Self::Entrance),
            "corridor" => Some(Self::Corridor),
            "waiting" => Some(Self::Waiting),
            "room" | "treatment" => Some(Self::Room),
            _ => None,
        }
    }
}

/// 灯段用途：导引路线或环境指示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    Path,
    Ambient,
}

impl SegmentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Ambient => "ambient",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "path" => Some(Self::Path),
            "ambient" => Some(Self::Ambient),
            _ => None,
        }
    }
}

/// LED 动画模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Solid,
    Pulse,
    Chase,
    Rainbow,
    Breathe,
    Wipe,
}

impl LedPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Pulse => "pulse",
            Self::Chase => "chase",
            Self::Rainbow => "rainbow",
            Self::Breathe => "breathe",
            Self::Wipe => "wipe",
        }
    }

    /// WLED 固件效果编号。
    pub fn effect_id(self) -> u8 {
        match self {
            Self::Solid => 0,
            Self::Pulse => 2,
            Self::Chase => 28,
            Self::Rainbow => 9,
            Self::Breathe => 2,
            Self::Wipe => 24,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "solid" => Some(Self::Solid),
            "pulse" => Some(Self::Pulse),
            "chase" => Some(Self::Chase),
            "rainbow" => Some(Self::Rainbow),
            "breathe" => Some(Self::Breathe),
            "wipe" => Some(Self::Wipe),
            _ => None,
        }
    }
}

/// 凭证类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    Egk,
    Custom,
    Temporary,
    Mobile,
}

impl CredentialType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Egk => "egk",
            Self::Custom => "custom",
            Self::Temporary => "temporary",
            Self::Mobile => "mobile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "egk" => Some(Self::Egk),
            "custom" => Some(Self::Custom),
            "temporary" => Some(Self::Temporary),
            "mobile" => Some(Self::Mobile),
            _ => None,
        }
    }
}

/// 票据状态。
///
/// WAITING → CALLED → IN_PROGRESS → COMPLETED；WAITING/CALLED → CANCELLED/NO_SHOW。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Waiting,
    Called,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "waiting" => Some(Self::Waiting),
            "called" => Some(Self::Called),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }

    /// 活跃票据：WAITING 或 CALLED。
    pub fn is_active(self) -> bool {
        matches!(self, Self::Waiting | Self::Called)
    }

    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Called)
                | (Self::Waiting, Self::Cancelled)
                | (Self::Waiting, Self::NoShow)
                | (Self::Called, Self::InProgress)
                | (Self::Called, Self::Cancelled)
                | (Self::Called, Self::NoShow)
                | (Self::InProgress, Self::Completed)
        )
    }
}

/// 票据优先级（声明顺序即排序：EMERGENCY 最高）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TicketPriority {
    Normal,
    High,
    Emergency,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Emergency => "emergency",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }
}

/// 签到方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInMethod {
    Nfc,
    Qr,
    Manual,
    Kiosk,
    Online,
}

impl CheckInMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nfc => "nfc",
            Self::Qr => "qr",
            Self::Manual => "manual",
            Self::Kiosk => "kiosk",
            Self::Online => "online",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nfc" => Some(Self::Nfc),
            "qr" => Some(Self::Qr),
            "manual" => Some(Self::Manual),
            "kiosk" => Some(Self::Kiosk),
            "online" => Some(Self::Online),
            _ => None,
        }
    }
}
