//! 签到前台 HTTP / WebSocket 服务。
//!
//! - 设备接口：签到、心跳（设备密钥认证）
//! - 员工接口：设备、凭证、队列、导引、等待时间（Bearer token + 权限码）
//! - 实时事件：`/ws/events/:practice_id`
//! - 命令总线桥接：读卡器扫描与设备状态上报

pub mod bus_bridge;
pub mod fixtures;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
pub use state::{AppState, Stores};
