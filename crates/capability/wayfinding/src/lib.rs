//! 导引能力：路线点亮、定时熄灭、候诊区环境灯。
//!
//! 段命令经 `LedCommandSink` 下发（WLED HTTP 或命令总线），
//! 每个灯段独立并行下发，单个控制器不可达不影响其余灯段。

mod command;
mod engine;
mod scheduler;
mod sink;

pub use command::{AMBIENT_BRIGHTNESS, ROUTE_BRIGHTNESS, SegmentCommand, ambient_color};
pub use engine::{AmbientUpdate, RouteActivation, RouteDeactivation, WayfindingEngine};
pub use scheduler::{ActiveRoute, DeactivationScheduler};
pub use sink::{BusLedSink, LedCommandSink, LedTarget, WledHttpSink};

/// 导引相关错误。
#[derive(Debug, thiserror::Error)]
pub enum WayfindingError {
    #[error("route not found")]
    RouteNotFound,
    #[error("route inactive")]
    RouteInactive,
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("controller not found")]
    ControllerNotFound,
    #[error("controller unreachable: {0}")]
    ControllerUnreachable(String),
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reception_storage::StorageError> for WayfindingError {
    fn from(err: reception_storage::StorageError) -> Self {
        WayfindingError::Storage(err.to_string())
    }
}
