//! 路线定时熄灭调度
//!
//! 每条路线至多一个待执行任务。重新点亮或手动熄灭会中止旧任务；
//! 定时任务醒来后须以自己的 generation 认领，认领失败即放弃执行。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;

/// 当前点亮中的路线。
#[derive(Debug, Clone)]
pub struct ActiveRoute {
    pub route_id: String,
    pub practice_id: String,
    pub expires_at_ms: i64,
}

struct Job {
    generation: u64,
    route: ActiveRoute,
    handle: AbortHandle,
}

/// 按路线 ID 索引的可取消延时任务。
pub struct DeactivationScheduler {
    jobs: Mutex<HashMap<String, Job>>,
    generation: AtomicU64,
}

impl DeactivationScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(1),
        }
    }

    /// 分配下一次调度的 generation。
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst)
    }

    /// 登记延时任务；同一路线的旧任务被中止。
    pub fn schedule<F>(&self, route: ActiveRoute, generation: u64, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(mut jobs) = self.jobs.lock() else {
            return;
        };
        // 先持锁再启动，保证任务认领时登记已完成
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        })
        .abort_handle();
        if let Some(previous) = jobs.insert(
            route.route_id.clone(),
            Job {
                generation,
                route,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    /// 中止路线的待执行任务，返回是否存在。
    pub fn cancel(&self, route_id: &str) -> bool {
        let Ok(mut jobs) = self.jobs.lock() else {
            return false;
        };
        match jobs.remove(route_id) {
            Some(job) => {
                job.handle.abort();
                true
            }
            None => false,
        }
    }

    /// 定时任务认领执行权：仅当登记的 generation 与自身一致时移除并返回 true。
    pub fn claim(&self, route_id: &str, generation: u64) -> bool {
        let Ok(mut jobs) = self.jobs.lock() else {
            return false;
        };
        match jobs.get(route_id) {
            Some(job) if job.generation == generation => {
                jobs.remove(route_id);
                true
            }
            _ => false,
        }
    }

    /// 中止诊所下的全部任务，返回被中止的路线 ID。
    pub fn cancel_practice(&self, practice_id: &str) -> Vec<String> {
        let Ok(mut jobs) = self.jobs.lock() else {
            return Vec::new();
        };
        let route_ids: Vec<String> = jobs
            .values()
            .filter(|job| job.route.practice_id == practice_id)
            .map(|job| job.route.route_id.clone())
            .collect();
        for route_id in &route_ids {
            if let Some(job) = jobs.remove(route_id) {
                job.handle.abort();
            }
        }
        route_ids
    }

    pub fn active(&self, practice_id: Option<&str>) -> Vec<ActiveRoute> {
        let Ok(jobs) = self.jobs.lock() else {
            return Vec::new();
        };
        let mut routes: Vec<ActiveRoute> = jobs
            .values()
            .filter(|job| practice_id.is_none_or(|id| job.route.practice_id == id))
            .map(|job| job.route.clone())
            .collect();
        routes.sort_by_key(|route| route.expires_at_ms);
        routes
    }
}

impl Default for DeactivationScheduler {
    fn default() -> Self {
        Self::new()
    }
}
