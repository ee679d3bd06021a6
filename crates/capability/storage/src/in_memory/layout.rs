//! 空间布局内存存储实现
//!
//! 区域、灯段与导引路线。区域由外部管理面维护，只提供插入（种子数据）。

use crate::error::StorageError;
use crate::models::{RouteRecord, SegmentRecord, ZoneRecord};
use crate::traits::{RouteStore, SegmentStore, ZoneStore};
use crate::validation::{ensure_practice_scope, in_scope};
use domain::{PracticeContext, led_ranges_overlap};
use std::collections::HashMap;
use std::sync::RwLock;

/// 区域内存存储
pub struct InMemoryZoneStore {
    zones: RwLock<HashMap<String, ZoneRecord>>,
}

impl InMemoryZoneStore {
    pub fn new() -> Self {
        Self {
            zones: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert_zone(&self, record: ZoneRecord) -> Result<(), StorageError> {
        let mut map = self
            .zones
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.zone_id.clone(), record);
        Ok(())
    }
}

impl Default for InMemoryZoneStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ZoneStore for InMemoryZoneStore {
    async fn list_zones(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<ZoneRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let map = self
            .zones
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<ZoneRecord> = map
            .values()
            .filter(|item| item.practice_id == practice_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(items)
    }

    async fn find_zone(
        &self,
        ctx: &PracticeContext,
        zone_id: &str,
    ) -> Result<Option<ZoneRecord>, StorageError> {
        let item = self
            .zones
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(zone_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }
}

/// 灯段内存存储
pub struct InMemorySegmentStore {
    segments: RwLock<HashMap<String, SegmentRecord>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn list_segments(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<SegmentRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let map = self
            .segments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<SegmentRecord> = map
            .values()
            .filter(|item| item.practice_id == practice_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.controller_id
                .cmp(&b.controller_id)
                .then(a.index.cmp(&b.index))
        });
        Ok(items)
    }

    async fn find_segment(
        &self,
        ctx: &PracticeContext,
        segment_id: &str,
    ) -> Result<Option<SegmentRecord>, StorageError> {
        let item = self
            .segments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(segment_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn list_zone_segments(
        &self,
        ctx: &PracticeContext,
        zone_id: &str,
    ) -> Result<Vec<SegmentRecord>, StorageError> {
        let map = self
            .segments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<SegmentRecord> = map
            .values()
            .filter(|item| item.zone_id == zone_id && in_scope(ctx, &item.practice_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.controller_id
                .cmp(&b.controller_id)
                .then(a.index.cmp(&b.index))
        });
        Ok(items)
    }

    async fn create_segment(
        &self,
        ctx: &PracticeContext,
        record: SegmentRecord,
    ) -> Result<SegmentRecord, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        if record.start_led > record.end_led {
            return Err(StorageError::new("segment range invalid"));
        }
        let mut map = self
            .segments
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.segment_id) {
            return Err(StorageError::new("segment exists"));
        }
        let conflict = map.values().any(|item| {
            item.controller_id == record.controller_id
                && (item.index == record.index
                    || led_ranges_overlap(
                        (item.start_led, item.end_led),
                        (record.start_led, record.end_led),
                    ))
        });
        if conflict {
            return Err(StorageError::new("segment overlaps existing segment"));
        }
        map.insert(record.segment_id.clone(), record.clone());
        Ok(record)
    }
}

/// 导引路线内存存储
pub struct InMemoryRouteStore {
    routes: RwLock<HashMap<String, RouteRecord>>,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn find_route(
        &self,
        ctx: &PracticeContext,
        route_id: &str,
    ) -> Result<Option<RouteRecord>, StorageError> {
        let item = self
            .routes
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(route_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn list_routes(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<RouteRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let map = self
            .routes
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<RouteRecord> = map
            .values()
            .filter(|item| item.practice_id == practice_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn find_route_to_zone(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        from_zone_id: Option<&str>,
        to_zone_id: &str,
    ) -> Result<Option<RouteRecord>, StorageError> {
        let candidates = self
            .list_routes(ctx, practice_id)
            .await?
            .into_iter()
            .filter(|route| route.is_active && route.to_zone_id == to_zone_id);
        // 0 = 起点匹配，1 = 未限定起点，2 = 起点未知时的其他路线
        let best = candidates
            .filter_map(|route| {
                let rank = match (route.from_zone_id.as_deref(), from_zone_id) {
                    (Some(start), Some(origin)) if start == origin => 0,
                    (None, _) => 1,
                    (Some(_), None) => 2,
                    (Some(_), Some(_)) => return None,
                };
                Some((rank, route))
            })
            .min_by_key(|(rank, _)| *rank);
        Ok(best.map(|(_, route)| route))
    }

    async fn create_route(
        &self,
        ctx: &PracticeContext,
        record: RouteRecord,
    ) -> Result<RouteRecord, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut map = self
            .routes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.route_id) {
            return Err(StorageError::new("route exists"));
        }
        map.insert(record.route_id.clone(), record.clone());
        Ok(record)
    }
}
