//! 领域模型：诊所上下文、状态枚举与颜色/灯段工具。

pub mod color;
pub mod data;
pub mod permissions;

pub use color::{Rgb, led_ranges_overlap};
pub use data::{
    CheckInMethod, CredentialType, DeviceCategory, DeviceStatus, LedPattern, SegmentRole,
    TicketPriority, TicketStatus, ZoneType,
};

/// 诊所上下文：所有模块共享的执行上下文。
///
/// `practice_scope` 为空表示系统级调用（设备认证、周期任务）。
#[derive(Debug, Clone)]
pub struct PracticeContext {
    pub actor_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub practice_scope: Option<String>,
}

impl PracticeContext {
    /// 构造显式身份与权限范围的上下文。
    pub fn new(
        actor_id: impl Into<String>,
        roles: Vec<String>,
        permissions: Vec<String>,
        practice_scope: Option<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            roles,
            permissions,
            practice_scope,
        }
    }

    /// 系统级上下文（无诊所作用域）。
    pub fn system() -> Self {
        Self::new("system", Vec::new(), Vec::new(), None)
    }

    /// 设备上下文：作用域固定为设备所属诊所。
    pub fn for_device(device_id: &str, practice_id: &str) -> Self {
        Self::new(
            format!("device:{}", device_id),
            Vec::new(),
            Vec::new(),
            Some(practice_id.to_string()),
        )
    }

    /// 返回限定到指定诊所的副本。
    pub fn scoped_to(&self, practice_id: &str) -> Self {
        Self {
            practice_scope: Some(practice_id.to_string()),
            ..self.clone()
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|item| item == permission)
    }
}

impl Default for PracticeContext {
    /// 空上下文（仅用于测试或占位）。
    fn default() -> Self {
        Self::system()
    }
}
