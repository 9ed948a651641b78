use chrono::NaiveTime;

const LBS_PER_KG: f64 = 2.204_62;

/// clap value parser for `--at`. Accepts `HH:MM` or `HH:MM:SS`.
pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("Invalid time '{s}'. Use HH:MM (24-hour), e.g. 09:00"))
}

pub(crate) fn kg_to_lbs(kg: f64) -> f64 {
    kg * LBS_PER_KG
}

/// Format an optional metric, blank when absent.
pub(crate) fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{v:.precision$}"))
}
