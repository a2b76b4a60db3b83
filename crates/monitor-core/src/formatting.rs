//! Notification text templates.
//!
//! Messages are sent with Telegram's HTML parse mode, so any externally
//! sourced text (country names, error strings) is escaped first.

/// Escape the three characters Telegram's HTML mode treats as markup.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::escape_html;
///
/// assert_eq!(escape_html("Trinidad & Tobago"), "Trinidad &amp; Tobago");
/// assert_eq!(escape_html("<b>"), "&lt;b&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Per-country activity message.
///
/// Returns `None` when both counts are zero. The visitor and download lines
/// are only included when their count is positive.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::country_message;
///
/// let msg = country_message("Canada", 3, 0, "2024-01-15 12:00:00").unwrap();
/// assert_eq!(
///     msg,
///     "🌍 Activity from <b>Canada</b> at 2024-01-15 12:00:00\n👥 3 active visitor(s)"
/// );
/// assert!(country_message("Canada", 0, 0, "2024-01-15 12:00:00").is_none());
/// ```
pub fn country_message(
    country: &str,
    visitors: u64,
    downloads: u64,
    timestamp: &str,
) -> Option<String> {
    if visitors == 0 && downloads == 0 {
        return None;
    }

    let mut message = format!(
        "🌍 Activity from <b>{}</b> at {}",
        escape_html(country),
        timestamp
    );
    if visitors > 0 {
        message.push_str(&format!("\n👥 {} active visitor(s)", visitors));
    }
    if downloads > 0 {
        message.push_str(&format!("\n📥 {} download(s)", downloads));
    }
    Some(message)
}

/// Fallback message used when no monitored country has any activity.
pub fn no_activity_message(timestamp: &str) -> String {
    format!(
        "📊 No active visitors from monitored countries at {}",
        timestamp
    )
}

/// Message reporting a failed run.
pub fn error_message(error: &str) -> String {
    format!("❌ Error in analytics monitor: {}", escape_html(error))
}
