use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::ordered::OrderedMap;
use crate::schedule;

/// Review state for one completed task, keyed by task id in a [`RecordMap`].
///
/// Stored as `{completedDate, reviewDates, reviewCount, strength, nextReview?}`
/// with every instant in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    #[serde(rename = "completedDate", with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
    #[serde(with = "epoch_millis_array")]
    pub review_dates: [DateTime<Utc>; 5],
    pub review_count: u32,
    #[serde(deserialize_with = "clamped_strength")]
    pub strength: u8,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub next_review: Option<DateTime<Utc>>,
}

pub type RecordMap = OrderedMap<ReviewRecord>;

impl ReviewRecord {
    pub fn new(completed_at: DateTime<Utc>) -> Self {
        ReviewRecord {
            completed_at,
            review_dates: schedule::review_dates(completed_at),
            review_count: 0,
            strength: schedule::MIN_STRENGTH,
            next_review: None,
        }
    }

    /// `next_review` once a review has been recorded, otherwise the table
    /// entry for the current count. `None` once the table is exhausted.
    pub fn effective_next_date(&self) -> Option<DateTime<Utc>> {
        self.next_review
            .or_else(|| self.review_dates.get(self.review_count as usize).copied())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.effective_next_date().is_some_and(|next| now >= next)
    }
}

/// Current time at the precision records are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Out-of-range strengths in stored or imported data are pulled back into
/// the scheduler's range instead of failing the whole map.
fn clamped_strength<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(schedule::MIN_STRENGTH);
    }
    let clamped = raw.round().clamp(
        f64::from(schedule::MIN_STRENGTH),
        f64::from(schedule::MAX_STRENGTH),
    );
    Ok(clamped as u8)
}

mod epoch_millis_array {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dates: &[DateTime<Utc>; 5],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(dates.iter().map(|d| d.timestamp_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[DateTime<Utc>; 5], D::Error> {
        let millis = Vec::<i64>::deserialize(deserializer)?;
        let dates = millis
            .iter()
            .map(|&ms| {
                Utc.timestamp_millis_opt(ms)
                    .single()
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let len = dates.len();
        dates
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"exactly 5 review dates"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_record_defaults() {
        let record = ReviewRecord::new(t0());
        assert_eq!(record.review_count, 0);
        assert_eq!(record.strength, 1);
        assert!(record.next_review.is_none());
        assert_eq!(record.review_dates[0], t0() + Days::new(1));
        assert_eq!(record.review_dates[4], t0() + Days::new(30));
    }

    #[test]
    fn due_from_table() {
        let record = ReviewRecord::new(t0());
        assert!(!record.is_due(t0()));
        assert!(record.is_due(t0() + Days::new(1)));
    }

    #[test]
    fn next_review_overrides_table() {
        let mut record = ReviewRecord::new(t0());
        record.review_count = 1;
        record.next_review = Some(t0() + Days::new(10));
        assert!(!record.is_due(t0() + Days::new(3)));
        assert!(record.is_due(t0() + Days::new(10)));
    }

    #[test]
    fn exhausted_table_not_due() {
        let mut record = ReviewRecord::new(t0());
        record.review_count = 5;
        assert_eq!(record.effective_next_date(), None);
        assert!(!record.is_due(t0() + Days::new(365)));
    }

    #[test]
    fn storage_format_field_names() {
        let record = ReviewRecord::new(t0());
        let json = serde_json::to_value(&record).unwrap();
        let ms = t0().timestamp_millis();
        assert_eq!(json["completedDate"], ms);
        assert_eq!(json["reviewDates"].as_array().unwrap().len(), 5);
        assert_eq!(json["reviewDates"][0], ms + 86_400_000);
        assert_eq!(json["reviewCount"], 0);
        assert_eq!(json["strength"], 1);
        assert!(json.get("nextReview").is_none());
    }

    #[test]
    fn parses_stored_record() {
        let json = r#"{
            "completedDate": 1700000000000,
            "reviewDates": [1700086400000, 1700259200000, 1700604800000, 1701209600000, 1702592000000],
            "reviewCount": 2,
            "strength": 3,
            "nextReview": 1701000000000
        }"#;
        let record: ReviewRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.completed_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(record.review_count, 2);
        assert_eq!(record.strength, 3);
        assert_eq!(
            record.next_review.map(|d| d.timestamp_millis()),
            Some(1_701_000_000_000)
        );
    }

    #[test]
    fn rejects_wrong_number_of_dates() {
        let json = r#"{"completedDate":0,"reviewDates":[1,2,3],"reviewCount":0,"strength":1}"#;
        assert!(serde_json::from_str::<ReviewRecord>(json).is_err());
    }

    #[test]
    fn stored_strength_is_clamped() {
        let dates = "[1,2,3,4,5]";
        for (stored, expected) in [("0", 1), ("-4", 1), ("9", 5), ("300", 5), ("2.6", 3)] {
            let json = format!(
                r#"{{"completedDate":0,"reviewDates":{dates},"reviewCount":1,"strength":{stored}}}"#
            );
            let record: ReviewRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(record.strength, expected, "stored {stored}");
        }
    }

    #[test]
    fn oversized_strength_keeps_rest_of_map() {
        let json = r#"{
            "a": {"completedDate":0,"reviewDates":[1,2,3,4,5],"reviewCount":0,"strength":1},
            "b": {"completedDate":0,"reviewDates":[1,2,3,4,5],"reviewCount":2,"strength":1000}
        }"#;
        let records: RecordMap = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.get("b").unwrap().strength, 5);
    }

    #[test]
    fn now_has_millisecond_precision() {
        let now = now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
