//! 内存存储实现模块
//!
//! 用于测试、本地演示和单进程部署。
//!
//! - PracticeStore / PatientDirectory: InMemoryPracticeStore, InMemoryPatientDirectory
//! - DeviceStore / DeviceCommandStore: InMemoryDeviceStore, InMemoryDeviceCommandStore
//! - ZoneStore / SegmentStore / RouteStore: InMemoryZoneStore, InMemorySegmentStore, InMemoryRouteStore
//! - CredentialStore: InMemoryCredentialStore
//! - QueueStore / TicketStore: InMemoryQueueStore, InMemoryTicketStore
//! - CheckInEventStore / WaitTimeLogStore: InMemoryCheckInEventStore, InMemoryWaitTimeLogStore

pub mod audit;
pub mod credential;
pub mod device;
pub mod layout;
pub mod practice;
pub mod queue;

pub use audit::*;
pub use credential::*;
pub use device::*;
pub use layout::*;
pub use practice::*;
pub use queue::*;
