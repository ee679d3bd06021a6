//! 验证辅助函数
//!
//! - ensure_practice_scope：写操作前验证诊所作用域
//! - in_scope：读操作过滤（越界记录视为不存在）

use crate::error::StorageError;
use domain::PracticeContext;

/// 验证诊所归属
///
/// 上下文带作用域时，只允许访问该诊所的数据。
pub fn ensure_practice_scope(ctx: &PracticeContext, practice_id: &str) -> Result<(), StorageError> {
    if practice_id.is_empty() {
        return Err(StorageError::new("practice_id required"));
    }
    if !in_scope(ctx, practice_id) {
        return Err(StorageError::new("practice scope mismatch"));
    }
    Ok(())
}

/// 记录是否对当前上下文可见。
pub fn in_scope(ctx: &PracticeContext, practice_id: &str) -> bool {
    match ctx.practice_scope.as_deref() {
        Some(scope) => scope == practice_id,
        None => true,
    }
}
