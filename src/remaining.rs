// Remaining lease time parsing: "13天04小时35分后释放" -> 13

use regex::Regex;
use std::sync::LazyLock;

static DAYS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)天").expect("day pattern"));

/// Day count in a console countdown string, or 0 when there is none.
///
/// Only the first `<N>天` occurrence counts. A number too large for `u32` is treated like a
/// missing one; callers read 0 as "unknown", never as an error.
pub fn parse_remain_days(text: &str) -> u32 {
    DAYS.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}
