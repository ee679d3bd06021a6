//! Handlers 模块

pub mod checkin;
pub mod credentials;
pub mod devices;
pub mod events;
pub mod metrics;
pub mod queues;
pub mod wait_times;
pub mod wayfinding;

pub use checkin::*;
pub use credentials::*;
pub use devices::*;
pub use events::*;
pub use metrics::*;
pub use queues::*;
pub use wait_times::*;
pub use wayfinding::*;
