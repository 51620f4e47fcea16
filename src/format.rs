//! Human-readable text for events and notification messages.

use chrono::{Duration, FixedOffset};

use crate::model::{EventType, WeatherEvent};

/// Compact duration label: `1h 5m`, `2h`, `45m`, or `<1m`.
pub fn compact_duration(d: Duration) -> String {
    let total_min = d.num_minutes().max(0);
    let hours = total_min / 60;
    let minutes = total_min % 60;
    match (hours, minutes) {
        (0, 0) => "<1m".to_string(),
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Label for a trend window, e.g. `over 1h`, `over 3h`, `over 90m`.
pub fn window_label(window: Duration) -> String {
    let min = window.num_minutes();
    if min > 0 && min % 60 == 0 {
        format!("over {}h", min / 60)
    } else {
        format!("over {min}m")
    }
}

/// Escape the characters Telegram's legacy Markdown treats as entity markers.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Telegram-flavoured Markdown text for one event.
///
/// `offset` is the station's local offset; the clock line uses local `HH:MM`.
pub fn notification_text(event: &WeatherEvent, offset: FixedOffset) -> String {
    let mut text = format!("{} *{}*\n", event.icon, escape_markdown(&event.description));

    if !event.details.is_empty() {
        text.push_str(&escape_markdown(&event.details));
        text.push('\n');
    }

    if event.kind == EventType::WindGust && event.value != 0.0 {
        text.push_str(&format!("Speed: {:.1} m/s\n", event.value));
    }

    let local = event.time.with_timezone(&offset);
    text.push_str(&format!("\n🕐 {}", local.format("%H:%M")));
    text
}
