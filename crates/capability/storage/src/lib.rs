//! # Reception Storage 模块
//!
//! 签到核心的数据存储抽象层。持久化引擎是外部协作方，本 crate 只定义
//! 接口，并提供一套内存实现用于测试、演示和单进程部署。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：所有实体存储的异步 Trait 接口
//! 2. **数据模型层** (`models.rs`)：存储记录结构
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **验证辅助层** (`validation.rs`)：诊所作用域验证
//! 5. **实现层** (`in_memory/`)：`RwLock<HashMap>` 内存实现
//!
//! ## 设计约束
//!
//! - **显式上下文**：所有数据访问方法必须显式接收 `PracticeContext`
//! - **诊所作用域**：上下文带作用域时，越界读取视为不存在，越界写入报错
//! - **只追加**：签到事件与等待时间日志只追加，不修改
//! - **原子操作**：队列计数递增、票据状态 CAS 由存储实现保证单条原子性；
//!   跨步骤的串行化由队列管理器负责

pub mod error;
pub mod in_memory;
pub mod models;
pub mod traits;
pub mod validation;

pub use error::*;
pub use models::*;
pub use traits::*;
pub use validation::*;

pub use in_memory::{
    InMemoryCheckInEventStore, InMemoryCredentialStore, InMemoryDeviceCommandStore,
    InMemoryDeviceStore, InMemoryPatientDirectory, InMemoryPracticeStore, InMemoryQueueStore,
    InMemoryRouteStore, InMemorySegmentStore, InMemoryTicketStore, InMemoryWaitTimeLogStore,
    InMemoryZoneStore,
};
