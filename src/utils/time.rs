use chrono::{DateTime, Duration, Utc};

pub const UNDER_A_MINUTE: &str = "menos de un minuto";

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time, held back to `floor` when the clock reads earlier. Trail
/// timestamps for one application must never go backwards.
pub fn now_not_before(floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let current = now();
    match floor {
        Some(floor) if floor > current => floor,
        _ => current,
    }
}

fn count(n: i64, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, plural)
    }
}

/// Renders a duration in the coarsest non-zero unit. Months are used only
/// beyond 30 whole days; exactly 30 days stays in days. Negative durations
/// are treated as zero.
pub fn humanize_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    if minutes < 1 {
        return UNDER_A_MINUTE.to_string();
    }

    let days = duration.num_days();
    let hours = duration.num_hours() - days * 24;

    if days > 30 {
        return count(days / 30, "mes", "meses");
    }
    if days > 0 {
        let rendered = count(days, "día", "días");
        return if hours > 0 {
            format!("{} y {}", rendered, count(hours, "hora", "horas"))
        } else {
            rendered
        };
    }
    if hours > 0 {
        return count(hours, "hora", "horas");
    }
    count(minutes, "minuto", "minutos")
}
