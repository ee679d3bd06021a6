use chrono::{DateTime, FixedOffset, Offset, Utc};

/// 诊所本地日界（午夜）对应的 UTC epoch 毫秒。
///
/// 偏移为固定值，不随夏令时切换：夏令时期间需把诊所的
/// `utc_offset_minutes`（或 `RECEPTION_DEFAULT_UTC_OFFSET_MINUTES`）改为当前生效的偏移，
/// 例如德国冬季 60、夏季 120。偏移非法时按 UTC 处理。
pub fn day_start_ms(now_ms: i64, utc_offset_minutes: i32) -> i64 {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
        .unwrap_or_else(|| Utc.fix());
    let Some(now) = DateTime::<Utc>::from_timestamp_millis(now_ms) else {
        return now_ms;
    };
    now.with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|midnight| midnight.timestamp_millis())
        .unwrap_or(now_ms)
}

/// 票号：队列代码 + 三位计数。
pub fn format_ticket_number(code: &str, counter: i64) -> String {
    format!("{}-{:03}", code, counter)
}

/// 票号中的计数部分（最后一个 `-` 之后）。
pub fn ticket_counter(number: &str) -> Option<i64> {
    number.rsplit_once('-')?.1.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-10T23:30:00Z
    const LATE_EVENING_UTC: i64 = 1_710_113_400_000;

    #[test]
    fn utc_day_start() {
        assert_eq!(day_start_ms(LATE_EVENING_UTC, 0), 1_710_028_800_000);
    }

    #[test]
    fn local_offset_moves_day_boundary() {
        // UTC+1 时本地已是 3 月 11 日 00:30，日界为 2024-03-10T23:00:00Z
        assert_eq!(day_start_ms(LATE_EVENING_UTC, 60), 1_710_111_600_000);
    }

    #[test]
    fn summer_offset_must_be_configured_explicitly() {
        // 2024-07-10T22:30:00Z，柏林夏令时本地为 7 月 11 日 00:30
        let summer_evening = 1_720_650_600_000;
        // 仍按冬令时 +60 配置时日界停留在 7 月 10 日
        assert_eq!(day_start_ms(summer_evening, 60), 1_720_566_000_000);
        assert_eq!(day_start_ms(summer_evening, 120), 1_720_648_800_000);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(
            day_start_ms(LATE_EVENING_UTC, 24 * 60),
            day_start_ms(LATE_EVENING_UTC, 0)
        );
    }

    #[test]
    fn ticket_number_padding() {
        assert_eq!(format_ticket_number("A", 7), "A-007");
        assert_eq!(format_ticket_number("B", 1234), "B-1234");
    }

    #[test]
    fn counter_parsed_from_number() {
        assert_eq!(ticket_counter("A-007"), Some(7));
        assert_eq!(ticket_counter("XR-1000"), Some(1000));
        assert_eq!(ticket_counter("A7"), None);
    }
}
