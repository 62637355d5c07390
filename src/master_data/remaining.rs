//! Localized "time remaining" labels.

use crate::domain::ServerRegion;

struct TimeUnits {
    second: &'static str,
    minute: &'static str,
    hour: &'static str,
    day: &'static str,
}

const fn units(server: ServerRegion) -> TimeUnits {
    match server {
        ServerRegion::Jp | ServerRegion::Cn => TimeUnits {
            second: "秒",
            minute: "分",
            hour: "小时",
            day: "天",
        },
        ServerRegion::Tw => TimeUnits {
            second: "秒",
            minute: "分",
            hour: "小時",
            day: "天",
        },
        ServerRegion::En => TimeUnits {
            second: "s",
            minute: "m",
            hour: "h",
            day: "d",
        },
        ServerRegion::Kr => TimeUnits {
            second: "초",
            minute: "분",
            hour: "시간",
            day: "일",
        },
    }
}

/// Formats `secs` as a compact label in the server's language,
/// e.g. `2d3h4m5s` for the global server.
///
/// Only the leading unit and the units below it are printed, so a zero
/// hour count after a day count is left out (`1d2m0s`).
#[must_use]
pub fn format_remaining(secs: i64, show_seconds: bool, server: ServerRegion) -> String {
    let u = units(server);
    let secs = secs.max(0);
    let days = secs / 86_400;
    let label = below_one_day(secs % 86_400, show_seconds, &u);
    if days > 0 {
        format!("{days}{}{label}", u.day)
    } else {
        label
    }
}

fn below_one_day(secs: i64, show_seconds: bool, u: &TimeUnits) -> String {
    let hours = secs / 3_600;
    let minutes = secs % 3_600 / 60;
    let seconds = secs % 60;
    let mut label = String::new();
    if hours > 0 {
        label.push_str(&format!("{hours}{}", u.hour));
    }
    if secs >= 60 || !show_seconds {
        label.push_str(&format!("{minutes}{}", u.minute));
    }
    if show_seconds {
        label.push_str(&format!("{seconds}{}", u.second));
    }
    label
}
