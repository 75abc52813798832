use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

/// Parses `YYYY-MM-DD` or an RFC 3339 timestamp (its calendar date is kept).
pub fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|dt| dt.date()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_plain_dates_and_timestamps() {
        assert_eq!(parse_date("2025-03-01"), Some(date!(2025 - 03 - 01)));
        assert_eq!(parse_date(" 2025-03-01T10:30:00Z "), Some(date!(2025 - 03 - 01)));
        assert_eq!(parse_date("2025-03-01T23:30:00+05:30"), Some(date!(2025 - 03 - 01)));
        assert_eq!(parse_date("01/03/2025"), None);
        assert_eq!(parse_date("2025-02-30"), None);
    }
}
