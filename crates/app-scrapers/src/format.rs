//! Deterministic formatting of sizes, view counts and durations.

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else if bytes < GIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_views(views: u64) -> String {
    if views < 1_000 {
        views.to_string()
    } else if views < 1_000_000 {
        format!("{:.1}K", views as f64 / 1_000.0)
    } else {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    }
}

/// Format a duration in seconds for display.
///
/// Unknown (zero) durations render as "0:00", sub-minute ones as "45s",
/// longer ones as "M:SS" with an hour prefix once they pass an hour.
#[must_use]
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return "0:00".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes}:{seconds:02}")
    } else {
        format!("{seconds}s")
    }
}

/// Soft ordering for free-text quality labels; higher ranks sort first.
///
/// Labels are platform-dependent ("1080p", "4K", "HD (No Watermark)"),
/// so this is a heuristic, not a total order over all possible labels.
#[must_use]
pub fn quality_rank(quality: &str) -> u32 {
    let quality = quality.to_ascii_lowercase();

    if quality.contains("4k") {
        return 2160;
    }

    if let Some(n) = first_number(&quality) {
        return n;
    }

    if quality.contains("no watermark") {
        return 800;
    }

    if quality.contains("hd") || quality.contains("high") {
        return 720;
    }

    if quality.contains("sd") {
        return 480;
    }

    0
}

fn first_number(s: &str) -> Option<u32> {
    let digits = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();

    digits.parse().ok()
}
