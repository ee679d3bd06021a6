//! 票据与队列能力：票号分配、票据状态机、叫号。
//!
//! 同一队列的「计数递增」与「活跃票据查找后插入」在队列级异步互斥锁内串行执行，
//! 保证票号唯一且同一患者每天每队列至多一张活跃票据。

mod clock;
mod manager;

pub use clock::{day_start_ms, format_ticket_number};
pub use manager::{
    IssueTicket, IssuedTicket, QueueManager, QueueSettings, QueueStats, QueueSummary,
    QueueSummaryItem,
};

use domain::TicketStatus;

/// 队列相关错误。
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue not found")]
    QueueNotFound,
    #[error("no active queue available")]
    QueueUnavailable,
    #[error("queue empty")]
    QueueEmpty,
    #[error("ticket not found")]
    TicketNotFound,
    #[error("invalid transition: {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition { from: TicketStatus, to: TicketStatus },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reception_storage::StorageError> for QueueError {
    fn from(err: reception_storage::StorageError) -> Self {
        QueueError::Storage(err.to_string())
    }
}
