//! 存储接口 Trait 定义
//!
//! 设计原则：
//! - 所有接口显式接收 PracticeContext
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{
    CheckInEventRecord, CredentialRecord, DeviceRecord, DeviceUpdate, PatientRecord,
    PendingCommandRecord, PracticeRecord, QueueRecord, RouteRecord, SegmentRecord, TicketRecord,
    WaitTimeLogRecord, ZoneRecord,
};
use async_trait::async_trait;
use domain::{PracticeContext, TicketStatus};

/// 诊所存储接口（诊所 CRUD 属外部管理面，这里只读）。
#[async_trait]
pub trait PracticeStore: Send + Sync {
    async fn list_practices(&self, ctx: &PracticeContext)
    -> Result<Vec<PracticeRecord>, StorageError>;

    async fn find_practice(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Option<PracticeRecord>, StorageError>;
}

/// 患者目录（外部协作方）。
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient(
        &self,
        ctx: &PracticeContext,
        patient_id: &str,
    ) -> Result<Option<PatientRecord>, StorageError>;
}

/// 设备存储接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 列出诊所下所有设备（含已停用）
    async fn list_devices(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<DeviceRecord>, StorageError>;

    async fn find_device(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    async fn find_device_by_serial(
        &self,
        ctx: &PracticeContext,
        serial: &str,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 创建设备（序列号全局唯一）
    async fn create_device(
        &self,
        ctx: &PracticeContext,
        record: DeviceRecord,
    ) -> Result<DeviceRecord, StorageError>;

    async fn update_device(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
        update: DeviceUpdate,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 将最后心跳早于 `seen_before_ms` 的在线设备置为离线，返回被修改的设备
    async fn mark_stale_offline(
        &self,
        ctx: &PracticeContext,
        seen_before_ms: i64,
    ) -> Result<Vec<DeviceRecord>, StorageError>;
}

/// 设备待拉取命令存储接口
#[async_trait]
pub trait DeviceCommandStore: Send + Sync {
    async fn enqueue_command(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        record: PendingCommandRecord,
    ) -> Result<(), StorageError>;

    /// 取出并清空设备的待拉取命令（按入队顺序）
    async fn drain_commands(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<Vec<PendingCommandRecord>, StorageError>;
}

/// 区域存储接口
#[async_trait]
pub trait ZoneStore: Send + Sync {
    async fn list_zones(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<ZoneRecord>, StorageError>;

    async fn find_zone(
        &self,
        ctx: &PracticeContext,
        zone_id: &str,
    ) -> Result<Option<ZoneRecord>, StorageError>;
}

/// 灯段存储接口
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn list_segments(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<SegmentRecord>, StorageError>;

    async fn find_segment(
        &self,
        ctx: &PracticeContext,
        segment_id: &str,
    ) -> Result<Option<SegmentRecord>, StorageError>;

    async fn list_zone_segments(
        &self,
        ctx: &PracticeContext,
        zone_id: &str,
    ) -> Result<Vec<SegmentRecord>, StorageError>;

    /// 创建灯段（同一控制器上的 LED 区间不得重叠）
    async fn create_segment(
        &self,
        ctx: &PracticeContext,
        record: SegmentRecord,
    ) -> Result<SegmentRecord, StorageError>;
}

/// 导引路线存储接口
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn find_route(
        &self,
        ctx: &PracticeContext,
        route_id: &str,
    ) -> Result<Option<RouteRecord>, StorageError>;

    async fn list_routes(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<RouteRecord>, StorageError>;

    /// 查找从 `from_zone_id` 出发、指向目标区域的启用路线
    ///
    /// 起点完全匹配的路线优先，其次是未限定起点的路线；
    /// 起点属于其他区域的路线不会被选中。起点未知时不按起点过滤。
    async fn find_route_to_zone(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        from_zone_id: Option<&str>,
        to_zone_id: &str,
    ) -> Result<Option<RouteRecord>, StorageError>;

    async fn create_route(
        &self,
        ctx: &PracticeContext,
        record: RouteRecord,
    ) -> Result<RouteRecord, StorageError>;
}

/// 凭证存储接口
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 创建凭证（查找摘要全局唯一）
    async fn create_credential(
        &self,
        ctx: &PracticeContext,
        record: CredentialRecord,
    ) -> Result<CredentialRecord, StorageError>;

    async fn find_by_digest(
        &self,
        ctx: &PracticeContext,
        lookup_digest: &str,
    ) -> Result<Option<CredentialRecord>, StorageError>;

    async fn find_credential(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError>;

    /// 整体替换已有凭证（重新绑定已停用凭证时使用）
    async fn replace_credential(
        &self,
        ctx: &PracticeContext,
        record: CredentialRecord,
    ) -> Result<bool, StorageError>;

    async fn list_patient_credentials(
        &self,
        ctx: &PracticeContext,
        patient_id: &str,
    ) -> Result<Vec<CredentialRecord>, StorageError>;

    /// 停用凭证；已停用时返回 false
    async fn deactivate_credential(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
        at_ms: i64,
    ) -> Result<bool, StorageError>;

    async fn touch_credential(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
        at_ms: i64,
    ) -> Result<(), StorageError>;
}

/// 队列存储接口
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn create_queue(
        &self,
        ctx: &PracticeContext,
        record: QueueRecord,
    ) -> Result<QueueRecord, StorageError>;

    async fn find_queue(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Option<QueueRecord>, StorageError>;

    async fn list_queues(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<QueueRecord>, StorageError>;

    /// 原子递增队列计数并返回新值；队列不存在或停用时返回 None
    async fn increment_counter(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Option<i64>, StorageError>;
}

/// 票据存储接口
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// 创建票据（同一队列内票号唯一）
    async fn create_ticket(
        &self,
        ctx: &PracticeContext,
        record: TicketRecord,
    ) -> Result<TicketRecord, StorageError>;

    async fn find_ticket(
        &self,
        ctx: &PracticeContext,
        ticket_id: &str,
    ) -> Result<Option<TicketRecord>, StorageError>;

    async fn find_ticket_by_number(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        number: &str,
    ) -> Result<Option<TicketRecord>, StorageError>;

    /// 查找患者在队列中自 `since_ms` 起创建的活跃票据
    async fn find_active_ticket(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        patient_id: &str,
        since_ms: i64,
    ) -> Result<Option<TicketRecord>, StorageError>;

    async fn list_tickets(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Vec<TicketRecord>, StorageError>;

    /// 状态 CAS：仅当当前状态为 `from` 时迁移到 `to` 并记录时间戳
    async fn transition_ticket(
        &self,
        ctx: &PracticeContext,
        ticket_id: &str,
        from: TicketStatus,
        to: TicketStatus,
        at_ms: i64,
        actor: Option<&str>,
    ) -> Result<Option<TicketRecord>, StorageError>;
}

/// 签到事件存储接口（只追加）
#[async_trait]
pub trait CheckInEventStore: Send + Sync {
    async fn append_event(
        &self,
        ctx: &PracticeContext,
        record: CheckInEventRecord,
    ) -> Result<(), StorageError>;

    /// 按时间倒序列出最近事件
    async fn list_events(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        limit: usize,
    ) -> Result<Vec<CheckInEventRecord>, StorageError>;
}

/// 等待时间日志存储接口（只追加）
#[async_trait]
pub trait WaitTimeLogStore: Send + Sync {
    async fn append_log(
        &self,
        ctx: &PracticeContext,
        record: WaitTimeLogRecord,
    ) -> Result<(), StorageError>;

    async fn list_logs(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        limit: usize,
    ) -> Result<Vec<WaitTimeLogRecord>, StorageError>;
}
