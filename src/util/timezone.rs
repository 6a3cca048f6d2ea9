use chrono::{DateTime, Offset, Utc};
use chrono_tz::Tz;
use time::{OffsetDateTime, UtcOffset};

pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> DateTime<Tz> {
    let utc = time.to_offset(UtcOffset::UTC);
    let datetime_utc = DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), utc.nanosecond())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    datetime_utc.with_timezone(&tz)
}

/// The same instant expressed with the zone's UTC offset at that moment.
pub fn to_local(time: OffsetDateTime, tz: Tz) -> OffsetDateTime {
    let seconds = localized_datetime(time, tz).offset().fix().local_minus_utc();
    UtcOffset::from_whole_seconds(seconds)
        .map(|offset| time.to_offset(offset))
        .unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn local_date_follows_zone_offset() {
        let late_evening = datetime!(2021-03-06 22:30 UTC);
        let moscow = to_local(late_evening, chrono_tz::Europe::Moscow);

        assert_eq!(moscow.date(), date!(2021 - 03 - 07));
        assert_eq!(moscow.offset().whole_hours(), 3);
        assert_eq!(moscow, late_evening);
    }

    #[test]
    fn utc_zone_is_identity() {
        let instant = datetime!(2020-01-01 00:00 UTC);
        assert_eq!(to_local(instant, chrono_tz::UTC), instant);
    }
}
