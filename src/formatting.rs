use chrono::NaiveDate;
use std::collections::BTreeSet;

/// `2026-10-14` becomes `Wednesday, 14 October 2026`. Unparseable input is
/// returned unchanged so that a malformed record still produces a readable
/// email.
pub fn format_long_date(date: &str) -> String {
    let date = date.trim();
    let day = date.get(..10).unwrap_or(date);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%A, %-d %B %Y").to_string(),
        Err(_) => date.to_string(),
    }
}

/// 24-hour `HH:MM` to a 12-hour clock with AM/PM.
pub fn format_time_12h(time: &str) -> String {
    let time = time.trim();
    let Some((hours, minutes)) = time.split_once(':') else {
        return time.to_string();
    };
    let minutes = minutes.get(..2).unwrap_or(minutes);
    let (Ok(hours), Ok(minutes)) = (hours.parse::<u32>(), minutes.parse::<u32>()) else {
        return time.to_string();
    };
    if hours > 23 || minutes > 59 {
        return time.to_string();
    }
    let period = if hours < 12 { "AM" } else { "PM" };
    let display_hours = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hours}:{minutes:02} {period}")
}

/// Display-only reference shown to customers. Not unique.
pub fn booking_reference(document_id: &str) -> String {
    document_id.chars().take(8).collect::<String>().to_uppercase()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Unique, normalized, non-empty recipient addresses.
pub fn unique_recipients<'a, I>(emails: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    emails
        .into_iter()
        .flatten()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Dollars as shown in emails, e.g. `$25.00`.
pub fn format_amount(amount: f64) -> String {
    format!("${amount:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_twelve_hour_times() {
        assert_eq!(format_time_12h("00:00"), "12:00 AM");
        assert_eq!(format_time_12h("12:00"), "12:00 PM");
        assert_eq!(format_time_12h("14:45"), "2:45 PM");
        assert_eq!(format_time_12h("09:05"), "9:05 AM");
        assert_eq!(format_time_12h("23:59"), "11:59 PM");
    }

    #[test]
    fn leaves_bad_times_alone() {
        assert_eq!(format_time_12h("soon"), "soon");
        assert_eq!(format_time_12h("25:00"), "25:00");
        assert_eq!(format_time_12h(""), "");
    }

    #[test]
    fn formats_long_dates() {
        assert_eq!(format_long_date("2026-10-14"), "Wednesday, 14 October 2026");
        assert_eq!(format_long_date("2024-01-05T09:00:00Z"), "Friday, 5 January 2024");
        assert_eq!(format_long_date("next week"), "next week");
    }

    #[test]
    fn derives_booking_reference() {
        assert_eq!(booking_reference("abcdefgh-extra-chars"), "ABCDEFGH");
        assert_eq!(booking_reference("xy1"), "XY1");
    }

    #[test]
    fn dedups_recipients_case_and_space_insensitively() {
        let recipients = unique_recipients([Some("A@x.com"), Some(" a@x.com ")]);
        assert_eq!(recipients.len(), 1);
        assert!(recipients.contains("a@x.com"));
    }

    #[test]
    fn drops_missing_and_blank_recipients() {
        let recipients = unique_recipients([Some("a@x.com"), None, Some("  "), Some("b@x.com")]);
        assert_eq!(recipients.len(), 2);
    }

    #[test]
    fn formats_amounts() {
        assert_eq!(format_amount(25.0), "$25.00");
        assert_eq!(format_amount(9.5), "$9.50");
    }
}
