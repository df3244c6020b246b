use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Formats a peso amount with comma thousands separators, e.g. `$25,000`.
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

pub fn format_local_datetime(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%d/%m/%Y %H:%M").to_string()
}

pub fn format_local_time(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prices_are_grouped() {
        assert_eq!(format_price(0), "$0");
        assert_eq!(format_price(950), "$950");
        assert_eq!(format_price(25000), "$25,000");
        assert_eq!(format_price(1234567), "$1,234,567");
        assert_eq!(format_price(-1500), "-$1,500");
    }

    #[test]
    fn local_time_uses_clinic_zone() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 13, 30, 0).unwrap();
        // Santiago is UTC-3 in January.
        assert_eq!(
            format_local_datetime(at, chrono_tz::America::Santiago),
            "15/01/2025 10:30"
        );
        assert_eq!(format_local_time(at, chrono_tz::America::Santiago), "10:30");
    }
}
