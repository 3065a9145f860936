//! Date helper functions

use chrono::{DateTime, Locale, Utc};

/// Resolve a locale name such as `pt_BR`, falling back to POSIX
pub fn locale_from_name(name: &str) -> Locale {
    match Locale::try_from(name.replace('-', "_").as_str()) {
        Ok(locale) => locale,
        Err(_) => {
            tracing::warn!("Unknown locale {:?}, using POSIX", name);
            Locale::POSIX
        }
    }
}

/// Format a publication date with a strftime pattern in the given locale
///
/// Documents that were never published have no date and render as an
/// empty string.
///
/// # Examples
/// ```ignore
/// format_publication_date(Some(&date), "%-d %b %Y", Locale::pt_BR) // -> "25 mar 2021"
/// ```
pub fn format_publication_date(
    date: Option<&DateTime<Utc>>,
    format: &str,
    locale: Locale,
) -> String {
    match date {
        Some(date) => date.format_localized(format, locale).to_string(),
        None => String::new(),
    }
}

/// Format a date in ISO 8601 for `<time datetime>`
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_publication_date() {
        let date = Utc.with_ymd_and_hms(2021, 3, 15, 10, 30, 0).unwrap();
        assert_eq!(
            format_publication_date(Some(&date), "%-d %b %Y", Locale::en_US),
            "15 Mar 2021"
        );
        assert_eq!(
            format_publication_date(Some(&date), "%Y-%m-%d", Locale::pt_BR),
            "2021-03-15"
        );
    }

    #[test]
    fn test_missing_date_is_blank() {
        assert_eq!(format_publication_date(None, "%-d %b %Y", Locale::pt_BR), "");
    }

    #[test]
    fn test_locale_from_name() {
        assert_eq!(locale_from_name("pt_BR"), Locale::pt_BR);
        assert_eq!(locale_from_name("pt-BR"), Locale::pt_BR);
        assert_eq!(locale_from_name("xx_NOPE"), Locale::POSIX);
    }

    #[test]
    fn test_date_xml() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(date_xml(&date), "2024-01-15T10:30:00+00:00");
    }
}
