const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const TRADING_SECONDS_PER_DAY: f64 = 6.5 * 3600.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    pub label: String,
    pub step_seconds: i64,
}

impl Timeframe {
    pub fn parse(value: &str) -> Result<Self, String> {
        let normalized = value.trim().to_lowercase();
        let label = match normalized.as_str() {
            "1m" | "1min" => "1min",
            "5m" | "5min" => "5min",
            "15m" | "15min" => "15min",
            "30m" | "30min" => "30min",
            "1h" | "1hour" => "1hour",
            "4h" | "4hour" => "4hour",
            "1d" | "1day" => "1day",
            "1w" | "1week" => "1week",
            "1mo" | "1month" => "1month",
            _ => return Err(format!("unsupported timeframe: {value}")),
        };

        let step_seconds = parse_duration_like_seconds(label)?;
        Ok(Self {
            label: label.to_string(),
            step_seconds,
        })
    }

    /// Bars per year on an equity-market calendar (252 sessions of 6.5 hours).
    pub fn periods_per_year(&self) -> f64 {
        match self.label.as_str() {
            "1day" => TRADING_DAYS_PER_YEAR,
            "1week" => 52.0,
            "1month" => 12.0,
            _ => TRADING_DAYS_PER_YEAR * TRADING_SECONDS_PER_DAY / self.step_seconds as f64,
        }
    }
}

pub fn parse_duration_like_seconds(value: &str) -> Result<i64, String> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Ok(seconds);
    }

    let (number_part, unit) = if let Some(stripped) = trimmed.strip_suffix("min") {
        (stripped, "min")
    } else if let Some(stripped) = trimmed.strip_suffix("hour") {
        (stripped, "hour")
    } else if let Some(stripped) = trimmed.strip_suffix("day") {
        (stripped, "day")
    } else if let Some(stripped) = trimmed.strip_suffix("week") {
        (stripped, "week")
    } else if let Some(stripped) = trimmed.strip_suffix("month") {
        (stripped, "month")
    } else {
        trimmed.split_at(trimmed.len().saturating_sub(1))
    };

    let multiplier = match unit {
        "s" => 1,
        "m" | "min" => 60,
        "h" | "hour" => 3600,
        "d" | "day" => 86400,
        "w" | "week" => 604800,
        "month" => 2592000,
        _ => return Err(format!("unsupported duration unit: {unit}")),
    };

    let number: i64 = number_part
        .parse()
        .map_err(|_| format!("invalid duration: {value}"))?;
    Ok(number * multiplier)
}
