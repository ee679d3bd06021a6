use domain::{LedPattern, Rgb};
use serde_json::{Value, json};

/// 路线点亮亮度。
pub const ROUTE_BRIGHTNESS: u8 = 255;
/// 环境灯亮度（低强度）。
pub const AMBIENT_BRIGHTNESS: u8 = 128;

/// 单个灯段命令（控制器本地段号）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCommand {
    pub segment_index: u8,
    pub on: bool,
    pub brightness: u8,
    pub color: Rgb,
    pub effect_id: u8,
}

impl SegmentCommand {
    pub fn on(segment_index: u8, color: Rgb, brightness: u8, pattern: LedPattern) -> Self {
        Self {
            segment_index,
            on: true,
            brightness,
            color,
            effect_id: pattern.effect_id(),
        }
    }

    pub fn off(segment_index: u8) -> Self {
        Self {
            segment_index,
            on: false,
            brightness: 0,
            color: Rgb::new(0, 0, 0),
            effect_id: 0,
        }
    }

    /// WLED JSON API 的 `seg` 元素。
    pub fn to_wled(&self) -> Value {
        if !self.on {
            return json!({ "id": self.segment_index, "on": false });
        }
        json!({
            "id": self.segment_index,
            "on": true,
            "bri": self.brightness,
            "col": [self.color.to_array()],
            "fx": self.effect_id,
        })
    }
}

/// 等待时间分级颜色：<10 绿，<20 黄，<30 橙，其余红。
pub fn ambient_color(average_wait_minutes: f64) -> Rgb {
    if average_wait_minutes < 10.0 {
        Rgb::new(0x00, 0xFF, 0x00)
    } else if average_wait_minutes < 20.0 {
        Rgb::new(0xFF, 0xFF, 0x00)
    } else if average_wait_minutes < 30.0 {
        Rgb::new(0xFF, 0x80, 0x00)
    } else {
        Rgb::new(0xFF, 0x00, 0x00)
    }
}
