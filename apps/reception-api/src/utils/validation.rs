//! 输入验证辅助函数
//!
//! - normalize_required：必填字段去除首尾空格并检查非空
//! - normalize_optional：可选字段提供时同样检查
//! - parse_enum：按领域枚举的 `parse` 解析字符串字段
//!
//! 失败统一返回 bad_request_error 响应。

use crate::utils::response::bad_request_error;
use axum::response::Response;

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

/// 验证可选字段，如果提供则去除空格并检查非空
pub fn normalize_optional(value: Option<String>, field: &str) -> Result<Option<String>, Response> {
    match value {
        Some(value) => normalize_required(value, field).map(Some),
        None => Ok(None),
    }
}

/// 解析枚举字段，未知取值返回 400
pub fn parse_enum<T>(
    value: &str,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, Response> {
    parse(&value.trim().to_ascii_lowercase())
        .ok_or_else(|| bad_request_error(format!("{field} invalid")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TicketStatus;

    #[test]
    fn trims_required_fields() {
        assert_eq!(
            normalize_required("  Empfang ".to_string(), "name").ok(),
            Some("Empfang".to_string())
        );
        assert!(normalize_required("   ".to_string(), "name").is_err());
        assert!(matches!(normalize_optional(None, "address"), Ok(None)));
    }

    #[test]
    fn parses_enum_fields() {
        assert!(parse_enum("waiting", "status", TicketStatus::parse).is_ok());
        assert!(parse_enum("gone", "status", TicketStatus::parse).is_err());
    }
}
