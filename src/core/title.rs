//! Purpose: Derive timestamped memo titles.
//! Exports: `generate_title`, `format_title`.
//! Role: Pure title derivation; the only clock read in the request pipeline.
//! Invariants: Titles are always `メモ_YYYY-MM-DD_HHmm` at a fixed +9h offset.
//! Invariants: The offset is applied explicitly; host timezone is never consulted.

use time::macros::offset;
use time::OffsetDateTime;

/// Title for a memo created now, in the service's fixed JST display offset.
pub fn generate_title() -> String {
    format_title(OffsetDateTime::now_utc())
}

/// Format an instant as `メモ_YYYY-MM-DD_HHmm`, shifted +9 hours.
///
/// Month, day, hour, and minute are always two digits.
pub fn format_title(instant: OffsetDateTime) -> String {
    let local = instant.to_offset(offset!(+9));
    format!(
        "メモ_{:04}-{:02}-{:02}_{:02}{:02}",
        local.year(),
        u8::from(local.month()),
        local.day(),
        local.hour(),
        local.minute()
    )
}

#[cfg(test)]
mod tests {
    use super::{format_title, generate_title};
    use time::macros::datetime;

    #[test]
    fn format_title_shifts_into_jst() {
        let title = format_title(datetime!(2025-01-15 05:30 UTC));
        assert_eq!(title, "メモ_2025-01-15_1430");
    }

    #[test]
    fn format_title_zero_pads_components() {
        let title = format_title(datetime!(2025-03-05 00:05 UTC));
        assert_eq!(title, "メモ_2025-03-05_0905");
    }

    #[test]
    fn format_title_rolls_over_the_date_boundary() {
        // 16:00 UTC is 01:00 the next day in JST.
        let title = format_title(datetime!(2024-12-31 16:00 UTC));
        assert_eq!(title, "メモ_2025-01-01_0100");
    }

    #[test]
    fn generate_title_matches_the_memo_pattern() {
        let title = generate_title();
        let stamp = title.strip_prefix("メモ_").expect("memo prefix");
        let bytes = stamp.as_bytes();
        assert_eq!(stamp.len(), "2025-01-15_1430".len());
        assert_eq!(bytes[4], b'-');
        assert_eq!(bytes[7], b'-');
        assert_eq!(bytes[10], b'_');
        for (index, byte) in bytes.iter().enumerate() {
            if ![4, 7, 10].contains(&index) {
                assert!(byte.is_ascii_digit(), "non-digit at {index} in {stamp}");
            }
        }
    }
}
