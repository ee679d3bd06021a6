//! 签到编排
//!
//! 关键路径：设备认证 → 凭证解析 → 患者与队列 → 出票（或返回当天已有票据）。
//! 关键路径完成后依次执行尽力而为的后置动作，任一后置动作失败
//! 只记录日志，不影响签到结果和其余后置动作。

mod messages;
mod notify;
mod orchestrator;

pub use messages::{
    MSG_NOT_REGISTERED, MSG_NO_QUEUE, MSG_UNAVAILABLE, resumed_message, welcome_message,
};
pub use notify::{
    Audience, NoopNotifier, Notification, Notifier, NotifyError, WebhookNotifier, sign_payload,
};
pub use orchestrator::{
    CheckInDeps, CheckInOrchestrator, CheckInOutcome, PostAction, ScanRequest,
};

/// 签到错误。只有设备认证失败和基础设施故障会以错误返回，
/// 其余失败以 `success = false` 的结果返回。
#[derive(Debug, thiserror::Error)]
pub enum CheckInError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reception_storage::StorageError> for CheckInError {
    fn from(err: reception_storage::StorageError) -> Self {
        CheckInError::Storage(err.to_string())
    }
}
