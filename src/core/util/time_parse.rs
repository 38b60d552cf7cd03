// Parsing and formatting of human time spans ("3h 5min", "1 day 2 hours").

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeParseError {
    #[error("No time given")]
    Empty,

    #[error("Brackets are not allowed in times")]
    Brackets,

    #[error("Could not understand `{0}`")]
    InvalidFormat(String),
}

/// Unit words that may stand on their own after a number ("5 min").
const UNIT_WORDS: [&str; 21] = [
    "s", "sec", "secs", "second", "seconds", "m", "min", "mins", "minute", "minutes", "h", "hr",
    "hrs", "hour", "hours", "d", "day", "days", "w", "week", "weeks",
];

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(3600),
        "d" | "day" | "days" => Some(86400),
        "w" | "week" | "weeks" => Some(604800),
        _ => None,
    }
}

/// Convert a time expression into seconds.
///
/// Accepts a plain number of seconds or any sequence of number+unit terms,
/// with or without a space in between: `90`, `3h 5min`, `1 day 2 hours`.
pub fn convert_to_seconds(input: &str) -> Result<u64, TimeParseError> {
    let input = input.trim().to_lowercase();

    if input.is_empty() {
        return Err(TimeParseError::Empty);
    }
    if input.contains('[') || input.contains(']') {
        return Err(TimeParseError::Brackets);
    }
    if let Ok(seconds) = input.parse::<u64>() {
        return Ok(seconds);
    }

    // Glue stand-alone units to the number before them: "5 min" -> "5min"
    let mut terms: Vec<String> = Vec::new();
    for token in input.split_whitespace() {
        let token = token.trim_matches(',');
        let follows_number = terms
            .last()
            .map_or(false, |last| last.chars().all(|c| c.is_ascii_digit()));

        if follows_number && UNIT_WORDS.contains(&token) {
            if let Some(last) = terms.last_mut() {
                last.push_str(token);
            }
        } else {
            terms.push(token.to_string());
        }
    }

    let mut total: u64 = 0;
    for term in terms.iter().filter(|t| *t != "and") {
        let split = term
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(term.len());
        let (number, unit) = term.split_at(split);

        let number: u64 = number
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(term.clone()))?;
        let multiplier =
            unit_multiplier(unit).ok_or_else(|| TimeParseError::InvalidFormat(term.clone()))?;

        total = total.saturating_add(number.saturating_mul(multiplier));
    }

    Ok(total)
}

fn plural(amount: u64, name: &str) -> String {
    format!("{} {}{}", amount, name, if amount == 1 { "" } else { "s" })
}

/// Format seconds as e.g. "1 day, 2 hours, 5 minutes and 3 seconds".
pub fn resolve_time(total_secs: u64) -> String {
    let days = total_secs / 86400;
    let hours = (total_secs % 86400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute"), (seconds, "second")]
        .into_iter()
        .filter(|(amount, _)| *amount > 0)
        .map(|(amount, name)| plural(amount, name))
        .collect();

    match parts.as_slice() {
        [] => plural(0, "second"),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}

/// Format seconds as a short "2h 5m" style string.
pub fn format_short(total_secs: u64) -> String {
    let days = total_secs / 86400;
    let hours = (total_secs % 86400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = Vec::new();
    if days > 0 {
        out.push(format!("{}d", days));
    }
    if hours > 0 {
        out.push(format!("{}h", hours));
    }
    if minutes > 0 {
        out.push(format!("{}m", minutes));
    }
    if seconds > 0 || out.is_empty() {
        out.push(format!("{}s", seconds));
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_seconds() {
        assert_eq!(convert_to_seconds("90"), Ok(90));
        assert_eq!(convert_to_seconds(" 5 "), Ok(5));
    }

    #[test]
    fn test_unit_expressions() {
        assert_eq!(convert_to_seconds("3h 5min"), Ok(3 * 3600 + 5 * 60));
        assert_eq!(convert_to_seconds("1 day 2 hours"), Ok(86400 + 7200));
        assert_eq!(convert_to_seconds("10m"), Ok(600));
        assert_eq!(convert_to_seconds("2 minutes and 30 seconds"), Ok(150));
        assert_eq!(convert_to_seconds("1w"), Ok(604800));
        assert_eq!(convert_to_seconds("45S"), Ok(45));
    }

    #[test]
    fn test_invalid_times() {
        assert_eq!(convert_to_seconds(""), Err(TimeParseError::Empty));
        assert_eq!(convert_to_seconds("[1h]"), Err(TimeParseError::Brackets));
        assert!(matches!(
            convert_to_seconds("soon"),
            Err(TimeParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            convert_to_seconds("5 parsecs"),
            Err(TimeParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_resolve_time() {
        assert_eq!(resolve_time(0), "0 seconds");
        assert_eq!(resolve_time(1), "1 second");
        assert_eq!(resolve_time(125), "2 minutes and 5 seconds");
        assert_eq!(resolve_time(90061), "1 day, 1 hour, 1 minute and 1 second");
        assert_eq!(resolve_time(7200), "2 hours");
    }

    #[test]
    fn test_format_short() {
        assert_eq!(format_short(0), "0s");
        assert_eq!(format_short(3725), "1h 2m 5s");
        assert_eq!(format_short(86400), "1d");
    }
}
