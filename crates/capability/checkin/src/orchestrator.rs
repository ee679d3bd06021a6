use crate::messages::{
    MSG_NO_QUEUE, MSG_NOT_REGISTERED, MSG_UNAVAILABLE, resumed_message, welcome_message,
};
use crate::notify::{Audience, Notification, Notifier};
use crate::CheckInError;
use api_contract::{EventEnvelope, EventType};
use domain::{CheckInMethod, PracticeContext, TicketPriority};
use reception_auth::{AuthError, DeviceRegistry};
use reception_credential::{CredentialError, CredentialResolver, Resolution};
use reception_queue::{IssueTicket, IssuedTicket, QueueError, QueueManager};
use reception_realtime::{Broadcaster, timestamp_now};
use reception_storage::{
    CheckInEventRecord, CheckInEventStore, CredentialRecord, DeviceRecord, PatientDirectory,
    PatientRecord, RouteStore, TicketRecord, ZoneStore,
};
use reception_wayfinding::WayfindingEngine;
use serde_json::json;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// 接收通知的员工角色（医疗助理）。
const STAFF_NOTIFY_ROLE: &str = "mfa";

/// 一次扫描。
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub raw_identifier: String,
    pub device_id: String,
    pub device_secret: String,
    pub method: CheckInMethod,
}

/// 签到结果。`success = false` 时不含票据。
#[derive(Debug, Clone)]
pub struct CheckInOutcome {
    pub success: bool,
    pub practice_id: String,
    pub ticket: Option<TicketRecord>,
    pub queue_name: Option<String>,
    pub route_id: Option<String>,
    pub patient_first_name: Option<String>,
    /// 返回的是当天已有的活跃票据
    pub resumed: bool,
    pub failure_reason: Option<&'static str>,
    pub message: String,
}

impl CheckInOutcome {
    pub fn ticket_number(&self) -> Option<&str> {
        self.ticket.as_ref().map(|ticket| ticket.number.as_str())
    }

    pub fn estimated_wait_minutes(&self) -> Option<u32> {
        self.ticket
            .as_ref()
            .map(|ticket| ticket.estimated_wait_minutes)
    }

    fn failed(practice_id: &str, reason: &'static str, message: &str) -> Self {
        Self {
            success: false,
            practice_id: practice_id.to_string(),
            ticket: None,
            queue_name: None,
            route_id: None,
            patient_first_name: None,
            resumed: false,
            failure_reason: Some(reason),
            message: message.to_string(),
        }
    }
}

/// 关键路径之后的后置动作，按声明顺序执行。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Wayfinding,
    RecordEvent,
    Broadcast,
    PatientPush,
    StaffPush,
}

impl PostAction {
    pub const ORDER: [PostAction; 5] = [
        PostAction::Wayfinding,
        PostAction::RecordEvent,
        PostAction::Broadcast,
        PostAction::PatientPush,
        PostAction::StaffPush,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PostAction::Wayfinding => "wayfinding",
            PostAction::RecordEvent => "record_event",
            PostAction::Broadcast => "broadcast",
            PostAction::PatientPush => "patient_push",
            PostAction::StaffPush => "staff_push",
        }
    }
}

/// 编排器依赖。
pub struct CheckInDeps {
    pub registry: Arc<DeviceRegistry>,
    pub credentials: Arc<CredentialResolver>,
    pub patients: Arc<dyn PatientDirectory>,
    pub queues: Arc<QueueManager>,
    pub routes: Arc<dyn RouteStore>,
    pub zones: Arc<dyn ZoneStore>,
    pub events: Arc<dyn CheckInEventStore>,
    pub wayfinding: Option<WayfindingEngine>,
    pub broadcaster: Arc<Broadcaster>,
    pub notifier: Arc<dyn Notifier>,
}

/// 关键路径成功后的上下文，供后置动作读写。
struct Admitted {
    ctx: PracticeContext,
    device: DeviceRecord,
    method: CheckInMethod,
    credential: CredentialRecord,
    patient: PatientRecord,
    issued: IssuedTicket,
    route_id: Option<String>,
}

pub struct CheckInOrchestrator {
    deps: CheckInDeps,
}

impl CheckInOrchestrator {
    pub fn new(deps: CheckInDeps) -> Self {
        Self { deps }
    }

    /// 处理一次扫描。
    ///
    /// 设备认证失败返回 `AuthenticationFailed` 且无任何副作用；
    /// 之后的失败都以 `success = false` 返回并写入签到事件。
    pub async fn check_in(&self, scan: ScanRequest) -> Result<CheckInOutcome, CheckInError> {
        let started = Instant::now();
        let device = match self
            .deps
            .registry
            .authenticate(&scan.device_id, &scan.device_secret)
            .await
        {
            Ok(device) => device,
            Err(AuthError::AuthenticationFailed) => return Err(CheckInError::AuthenticationFailed),
            Err(err) => return Err(CheckInError::Unavailable(err.to_string())),
        };
        let ctx = PracticeContext::for_device(&device.device_id, &device.practice_id);

        let outcome = match self.admit(&ctx, &device, &scan).await {
            Ok(mut admitted) => {
                for action in PostAction::ORDER {
                    if let Err(err) = self.run_post_action(action, &mut admitted).await {
                        reception_telemetry::record_post_action_failure();
                        warn!(
                            target: "reception.checkin",
                            practice_id = %device.practice_id,
                            device_id = %device.device_id,
                            action = action.as_str(),
                            error = %err,
                            "post_action_failed"
                        );
                    }
                }
                success_outcome(admitted)
            }
            Err(failure) => {
                self.record_failure(&ctx, &device, scan.method, &failure).await;
                CheckInOutcome::failed(&device.practice_id, failure.reason, failure.message)
            }
        };

        reception_telemetry::record_check_in(outcome.success);
        reception_telemetry::record_check_in_latency_ms(started.elapsed().as_millis() as u64);
        info!(
            target: "reception.checkin",
            practice_id = %device.practice_id,
            device_id = %device.device_id,
            method = scan.method.as_str(),
            success = outcome.success,
            resumed = outcome.resumed,
            failure_reason = outcome.failure_reason.unwrap_or(""),
            ticket = outcome.ticket_number().unwrap_or(""),
            "check_in_processed"
        );
        Ok(outcome)
    }

    /// 员工查看最近签到记录（倒序）。
    pub async fn history(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        limit: usize,
    ) -> Result<Vec<CheckInEventRecord>, CheckInError> {
        Ok(self
            .deps
            .events
            .list_events(ctx, practice_id, limit)
            .await?)
    }

    /// 关键路径：凭证 → 患者 → 队列 → 出票。
    async fn admit(
        &self,
        ctx: &PracticeContext,
        device: &DeviceRecord,
        scan: &ScanRequest,
    ) -> Result<Admitted, Failure> {
        let resolution = match self
            .deps
            .credentials
            .resolve_detailed(ctx, &scan.raw_identifier)
            .await
        {
            Ok(resolution) => resolution,
            Err(CredentialError::InvalidIdentifier) => {
                return Err(Failure::new("credential_not_found", MSG_NOT_REGISTERED));
            }
            Err(err) => return Err(Failure::internal(err.to_string())),
        };
        let credential = match resolution {
            Resolution::Resolved(record) => record,
            other => {
                let reason = other.failure_reason().unwrap_or("credential_not_found");
                let mut failure = Failure::new(reason, MSG_NOT_REGISTERED);
                match other {
                    Resolution::NotFound { lookup_digest } => {
                        failure.lookup_digest = Some(lookup_digest);
                    }
                    Resolution::Expired(record) | Resolution::Inactive(record) => {
                        failure.credential_id = Some(record.token_id);
                    }
                    Resolution::Resolved(_) => {}
                }
                return Err(failure);
            }
        };

        let patient = self
            .deps
            .patients
            .find_patient(ctx, &credential.patient_id)
            .await
            .map_err(|err| Failure::internal(err.to_string()))?
            .filter(|patient| patient.is_active && patient.practice_id == device.practice_id)
            .ok_or_else(|| {
                Failure::new("patient_not_found", MSG_NOT_REGISTERED)
                    .with_credential(&credential.token_id)
            })?;

        let queue = match self
            .deps
            .queues
            .default_queue(ctx, &device.practice_id)
            .await
        {
            Ok(queue) => queue,
            Err(QueueError::QueueUnavailable | QueueError::QueueNotFound) => {
                return Err(Failure::new("queue_unavailable", MSG_NO_QUEUE)
                    .with_credential(&credential.token_id)
                    .with_patient(&patient.patient_id));
            }
            Err(err) => {
                return Err(Failure::internal(err.to_string())
                    .with_credential(&credential.token_id)
                    .with_patient(&patient.patient_id));
            }
        };

        let issued = self
            .deps
            .queues
            .issue_ticket(
                ctx,
                IssueTicket {
                    queue_id: queue.queue_id.clone(),
                    patient_id: Some(patient.patient_id.clone()),
                    priority: TicketPriority::Normal,
                },
            )
            .await
            .map_err(|err| {
                let failure = match err {
                    QueueError::QueueUnavailable | QueueError::QueueNotFound => {
                        Failure::new("queue_unavailable", MSG_NO_QUEUE)
                    }
                    other => Failure::internal(other.to_string()),
                };
                failure
                    .with_credential(&credential.token_id)
                    .with_patient(&patient.patient_id)
            })?;

        Ok(Admitted {
            ctx: ctx.clone(),
            device: device.clone(),
            method: scan.method,
            credential,
            patient,
            issued,
            route_id: None,
        })
    }

    async fn run_post_action(
        &self,
        action: PostAction,
        admitted: &mut Admitted,
    ) -> Result<(), String> {
        match action {
            PostAction::Wayfinding => {
                admitted.route_id = self.activate_route(admitted).await?;
                Ok(())
            }
            PostAction::RecordEvent => {
                let ticket = &admitted.issued.ticket;
                let record = CheckInEventRecord {
                    event_id: uuid::Uuid::new_v4().to_string(),
                    practice_id: admitted.device.practice_id.clone(),
                    device_id: Some(admitted.device.device_id.clone()),
                    credential_id: Some(admitted.credential.token_id.clone()),
                    ticket_id: Some(ticket.ticket_id.clone()),
                    patient_id: Some(admitted.patient.patient_id.clone()),
                    method: admitted.method,
                    success: true,
                    failure_reason: None,
                    route_id: admitted.route_id.clone(),
                    lookup_digest: None,
                    checked_in_at_ms: now_epoch_ms(),
                };
                self.deps
                    .events
                    .append_event(&admitted.ctx, record)
                    .await
                    .map_err(|err| err.to_string())
            }
            PostAction::Broadcast => {
                self.broadcast(admitted).await;
                Ok(())
            }
            PostAction::PatientPush => {
                let ticket = &admitted.issued.ticket;
                let queue = &admitted.issued.queue;
                let notification = Notification {
                    practice_id: admitted.device.practice_id.clone(),
                    audience: Audience::Patient {
                        patient_id: admitted.patient.patient_id.clone(),
                    },
                    notification_type: "check_in_success",
                    title: "Check-in erfolgreich".to_string(),
                    body: format!(
                        "Ticket {} für {}. Wartezeit ca. {} Min.",
                        ticket.number, queue.name, ticket.estimated_wait_minutes
                    ),
                    data: json!({
                        "ticketNumber": ticket.number,
                        "queueName": queue.name,
                        "estimatedWait": ticket.estimated_wait_minutes,
                    }),
                };
                self.deps
                    .notifier
                    .send(&notification)
                    .await
                    .map_err(|err| err.to_string())
            }
            PostAction::StaffPush => {
                if !admitted.issued.created {
                    return Ok(());
                }
                let ticket = &admitted.issued.ticket;
                let queue = &admitted.issued.queue;
                let notification = Notification {
                    practice_id: admitted.device.practice_id.clone(),
                    audience: Audience::Staff {
                        role: STAFF_NOTIFY_ROLE.to_string(),
                    },
                    notification_type: "ticket_created",
                    title: format!("Neues Ticket: {}", ticket.number),
                    body: format!("Warteschlange {}", queue.name),
                    data: json!({ "ticketNumber": ticket.number, "queueName": queue.name }),
                };
                self.deps
                    .notifier
                    .send(&notification)
                    .await
                    .map_err(|err| err.to_string())
            }
        }
    }

    /// 队列关联的区域是启用的目的地时，点亮从读卡器所在区域出发的路线；部分点亮也算成功。
    async fn activate_route(&self, admitted: &Admitted) -> Result<Option<String>, String> {
        let Some(engine) = &self.deps.wayfinding else {
            return Ok(None);
        };
        let queue = &admitted.issued.queue;
        let Some(zone_id) = queue.zone_id.as_deref() else {
            return Ok(None);
        };
        let destination = self
            .deps
            .zones
            .find_zone(&admitted.ctx, zone_id)
            .await
            .map_err(|err| err.to_string())?
            .filter(|zone| zone.is_active && zone.is_destination);
        if destination.is_none() {
            info!(
                target: "reception.checkin",
                queue_id = %queue.queue_id,
                zone_id = %zone_id,
                "route_skipped_not_destination"
            );
            return Ok(None);
        }
        let Some(route) = self
            .deps
            .routes
            .find_route_to_zone(
                &admitted.ctx,
                &queue.practice_id,
                admitted.device.zone_id.as_deref(),
                zone_id,
            )
            .await
            .map_err(|err| err.to_string())?
        else {
            return Ok(None);
        };
        let activation = engine
            .activate_route(&admitted.ctx, &route.route_id)
            .await
            .map_err(|err| err.to_string())?;
        Ok(Some(activation.route_id))
    }

    async fn broadcast(&self, admitted: &Admitted) {
        let broadcaster = &self.deps.broadcaster;
        let scope = admitted.device.practice_id.as_str();
        let ticket = &admitted.issued.ticket;
        let queue = &admitted.issued.queue;
        let queue_topic = format!("queue:{}", queue.queue_id);

        let check_in = EventEnvelope::new(
            EventType::CheckIn,
            json!({
                "ticketNumber": ticket.number,
                "queueId": queue.queue_id,
                "queueName": queue.name,
                "method": admitted.method.as_str(),
                "routeId": admitted.route_id,
                "resumed": !admitted.issued.created,
            }),
            timestamp_now(),
        );
        broadcaster.broadcast_to_scope(scope, &check_in).await;

        if admitted.issued.created {
            let created = EventEnvelope::new(
                EventType::TicketCreated,
                json!({
                    "ticketId": ticket.ticket_id,
                    "ticketNumber": ticket.number,
                    "queueId": queue.queue_id,
                    "priority": ticket.priority.as_str(),
                    "estimatedWaitMinutes": ticket.estimated_wait_minutes,
                }),
                timestamp_now(),
            );
            broadcaster.broadcast_to_scope(scope, &created).await;
            broadcaster
                .broadcast_to_topic(scope, &queue_topic, &created)
                .await;
        }

        let updated = EventEnvelope::new(
            EventType::QueueUpdated,
            json!({
                "queueId": queue.queue_id,
                "currentNumber": queue.current_number,
            }),
            timestamp_now(),
        );
        broadcaster
            .broadcast_to_topic(scope, &queue_topic, &updated)
            .await;
    }

    async fn record_failure(
        &self,
        ctx: &PracticeContext,
        device: &DeviceRecord,
        method: CheckInMethod,
        failure: &Failure,
    ) {
        let record = CheckInEventRecord {
            event_id: uuid::Uuid::new_v4().to_string(),
            practice_id: device.practice_id.clone(),
            device_id: Some(device.device_id.clone()),
            credential_id: failure.credential_id.clone(),
            ticket_id: None,
            patient_id: failure.patient_id.clone(),
            method,
            success: false,
            failure_reason: Some(failure.reason.to_string()),
            route_id: None,
            lookup_digest: failure.lookup_digest.clone(),
            checked_in_at_ms: now_epoch_ms(),
        };
        if let Err(err) = self.deps.events.append_event(ctx, record).await {
            warn!(
                target: "reception.checkin",
                practice_id = %device.practice_id,
                error = %err,
                "check_in_event_failed"
            );
        }
        if let Some(detail) = &failure.detail {
            warn!(
                target: "reception.checkin",
                practice_id = %device.practice_id,
                device_id = %device.device_id,
                error = %detail,
                "check_in_internal_error"
            );
        }
    }
}

/// 关键路径失败：审计字段 + 面向患者的文案。
struct Failure {
    reason: &'static str,
    message: &'static str,
    credential_id: Option<String>,
    patient_id: Option<String>,
    lookup_digest: Option<String>,
    /// 内部错误详情，只进日志
    detail: Option<String>,
}

impl Failure {
    fn new(reason: &'static str, message: &'static str) -> Self {
        Self {
            reason,
            message,
            credential_id: None,
            patient_id: None,
            lookup_digest: None,
            detail: None,
        }
    }

    fn internal(detail: String) -> Self {
        Self {
            detail: Some(detail),
            ..Self::new("internal_error", MSG_UNAVAILABLE)
        }
    }

    fn with_credential(mut self, token_id: &str) -> Self {
        self.credential_id = Some(token_id.to_string());
        self
    }

    fn with_patient(mut self, patient_id: &str) -> Self {
        self.patient_id = Some(patient_id.to_string());
        self
    }
}

fn success_outcome(admitted: Admitted) -> CheckInOutcome {
    let resumed = !admitted.issued.created;
    let message = if resumed {
        resumed_message(&admitted.issued.ticket.number)
    } else {
        welcome_message(&admitted.patient.first_name)
    };
    CheckInOutcome {
        success: true,
        practice_id: admitted.device.practice_id,
        queue_name: Some(admitted.issued.queue.name),
        ticket: Some(admitted.issued.ticket),
        route_id: admitted.route_id,
        patient_first_name: Some(admitted.patient.first_name),
        resumed,
        failure_reason: None,
        message,
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
