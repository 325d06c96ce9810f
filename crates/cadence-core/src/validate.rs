//! Structural validation of candidate rules.
//!
//! Validation and construction are the same code path: `build_pattern` and
//! `build_end` either produce the sum-typed payload or name the offending
//! field. `validate` is build-and-discard, so create, update (on the merged
//! candidate) and row decoding all enforce identical shape rules.

use crate::error::ValidationError;
use crate::models::{
    weekday_from_index, weekday_index, CustomUnit, EndCondition, EndKind, MonthlyAnchor,
    NewRuleData, Pattern, RuleKind,
};

/// Checks a candidate rule without constructing anything. Pure predicate.
pub fn validate(data: &NewRuleData) -> Result<(), ValidationError> {
    build_pattern(data)?;
    build_end(data)?;
    Ok(())
}

/// Builds the per-kind pattern payload, rejecting missing, out-of-range, and
/// kind-inapplicable fields.
pub fn build_pattern(data: &NewRuleData) -> Result<Pattern, ValidationError> {
    if data.interval < 1 {
        return Err(ValidationError::InvalidInterval(data.interval));
    }

    match data.kind {
        RuleKind::Daily => {
            reject_weekly_fields(data)?;
            reject_monthly_fields(data)?;
            reject_custom_fields(data)?;
            Ok(Pattern::Daily)
        }
        RuleKind::Weekly => {
            reject_monthly_fields(data)?;
            reject_custom_fields(data)?;
            if data.days_of_week.is_empty() {
                return Err(ValidationError::MissingWeekdays);
            }
            let mut days = Vec::with_capacity(data.days_of_week.len());
            for &index in &data.days_of_week {
                let day =
                    weekday_from_index(index).ok_or(ValidationError::InvalidWeekday(index))?;
                days.push(day);
            }
            days.sort_by_key(weekday_index);
            days.dedup();
            Ok(Pattern::Weekly { days })
        }
        RuleKind::Monthly => {
            reject_weekly_fields(data)?;
            reject_custom_fields(data)?;
            build_monthly_anchor(data).map(|anchor| Pattern::Monthly { anchor })
        }
        RuleKind::Yearly => {
            reject_weekly_fields(data)?;
            reject_monthly_fields(data)?;
            reject_custom_fields(data)?;
            Ok(Pattern::Yearly)
        }
        RuleKind::Workdays => {
            reject_weekly_fields(data)?;
            reject_monthly_fields(data)?;
            reject_custom_fields(data)?;
            Ok(Pattern::Workdays)
        }
        RuleKind::Weekends => {
            reject_weekly_fields(data)?;
            reject_monthly_fields(data)?;
            reject_custom_fields(data)?;
            Ok(Pattern::Weekends)
        }
        RuleKind::Custom => {
            reject_weekly_fields(data)?;
            reject_monthly_fields(data)?;
            let unit = data.custom_unit.ok_or(ValidationError::MissingCustomUnit)?;
            Ok(Pattern::Custom { unit })
        }
    }
}

/// Builds the end condition, enforcing that exactly the payload matching
/// `end_kind` is populated.
pub fn build_end(data: &NewRuleData) -> Result<EndCondition, ValidationError> {
    match data.end_kind {
        EndKind::Never => {
            if data.end_date.is_some() {
                return Err(ValidationError::MismatchedEndPayload("end_date"));
            }
            if data.end_count.is_some() {
                return Err(ValidationError::MismatchedEndPayload("end_count"));
            }
            Ok(EndCondition::Never)
        }
        EndKind::UntilDate => {
            if data.end_count.is_some() {
                return Err(ValidationError::MismatchedEndPayload("end_count"));
            }
            let date = data.end_date.ok_or(ValidationError::MissingEndDate)?;
            Ok(EndCondition::UntilDate(date))
        }
        EndKind::AfterCount => {
            if data.end_date.is_some() {
                return Err(ValidationError::MismatchedEndPayload("end_date"));
            }
            match data.end_count {
                Some(count) if count >= 1 => Ok(EndCondition::AfterCount(count)),
                _ => Err(ValidationError::InvalidEndCount),
            }
        }
    }
}

fn build_monthly_anchor(data: &NewRuleData) -> Result<MonthlyAnchor, ValidationError> {
    let has_nth = data.week_of_month.is_some() || data.weekday_of_month.is_some();
    match (data.day_of_month, has_nth) {
        (Some(_), true) => Err(ValidationError::ConflictingMonthlyAnchor),
        (Some(day), false) => {
            if !(1..=31).contains(&day) {
                return Err(ValidationError::InvalidDayOfMonth(day));
            }
            Ok(MonthlyAnchor::DayOfMonth(day))
        }
        (None, true) => {
            // Both halves of the nth-weekday anchor are required.
            let (week, weekday_idx) = match (data.week_of_month, data.weekday_of_month) {
                (Some(week), Some(weekday)) => (week, weekday),
                _ => return Err(ValidationError::MissingMonthlyAnchor),
            };
            if !(1..=5).contains(&week) {
                return Err(ValidationError::InvalidWeekOfMonth(week));
            }
            let weekday = weekday_from_index(weekday_idx)
                .ok_or(ValidationError::InvalidWeekday(weekday_idx))?;
            Ok(MonthlyAnchor::NthWeekday { week, weekday })
        }
        (None, false) => Err(ValidationError::MissingMonthlyAnchor),
    }
}

fn reject_weekly_fields(data: &NewRuleData) -> Result<(), ValidationError> {
    if !data.days_of_week.is_empty() {
        return Err(ValidationError::UnexpectedField("days_of_week"));
    }
    Ok(())
}

fn reject_monthly_fields(data: &NewRuleData) -> Result<(), ValidationError> {
    if data.day_of_month.is_some() {
        return Err(ValidationError::UnexpectedField("day_of_month"));
    }
    if data.week_of_month.is_some() {
        return Err(ValidationError::UnexpectedField("week_of_month"));
    }
    if data.weekday_of_month.is_some() {
        return Err(ValidationError::UnexpectedField("weekday_of_month"));
    }
    Ok(())
}

fn reject_custom_fields(data: &NewRuleData) -> Result<(), ValidationError> {
    if data.custom_unit.is_some() {
        return Err(ValidationError::UnexpectedField("custom_unit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use rstest::rstest;

    fn weekly(days: Vec<u8>) -> NewRuleData {
        NewRuleData {
            kind: RuleKind::Weekly,
            days_of_week: days,
            ..Default::default()
        }
    }

    #[test]
    fn daily_defaults_are_valid() {
        assert!(validate(&NewRuleData::default()).is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let data = NewRuleData {
            interval: 0,
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::InvalidInterval(0)));
    }

    #[test]
    fn weekly_without_days_is_rejected() {
        assert_eq!(validate(&weekly(vec![])), Err(ValidationError::MissingWeekdays));
    }

    #[test]
    fn weekly_days_are_sorted_and_deduped() {
        let pattern = build_pattern(&weekly(vec![4, 0, 4, 2])).unwrap();
        assert_eq!(
            pattern,
            Pattern::Weekly {
                days: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
            }
        );
    }

    #[rstest]
    #[case(7)]
    #[case(255)]
    fn weekly_out_of_range_day_is_rejected(#[case] index: u8) {
        assert_eq!(
            validate(&weekly(vec![index])),
            Err(ValidationError::InvalidWeekday(index))
        );
    }

    #[test]
    fn monthly_requires_an_anchor() {
        let data = NewRuleData {
            kind: RuleKind::Monthly,
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::MissingMonthlyAnchor));
    }

    #[test]
    fn monthly_rejects_both_anchor_modes() {
        let data = NewRuleData {
            kind: RuleKind::Monthly,
            day_of_month: Some(15),
            week_of_month: Some(2),
            weekday_of_month: Some(1),
            ..Default::default()
        };
        assert_eq!(
            validate(&data),
            Err(ValidationError::ConflictingMonthlyAnchor)
        );
    }

    #[test]
    fn monthly_rejects_half_an_nth_weekday_anchor() {
        let data = NewRuleData {
            kind: RuleKind::Monthly,
            week_of_month: Some(2),
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::MissingMonthlyAnchor));
    }

    #[rstest]
    #[case(0, ValidationError::InvalidDayOfMonth(0))]
    #[case(32, ValidationError::InvalidDayOfMonth(32))]
    fn monthly_day_bounds(#[case] day: u8, #[case] expected: ValidationError) {
        let data = NewRuleData {
            kind: RuleKind::Monthly,
            day_of_month: Some(day),
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(expected));
    }

    #[test]
    fn monthly_nth_weekday_builds() {
        let data = NewRuleData {
            kind: RuleKind::Monthly,
            week_of_month: Some(5),
            weekday_of_month: Some(4),
            ..Default::default()
        };
        assert_eq!(
            build_pattern(&data).unwrap(),
            Pattern::Monthly {
                anchor: MonthlyAnchor::NthWeekday {
                    week: 5,
                    weekday: Weekday::Fri
                }
            }
        );
    }

    #[test]
    fn monthly_week_out_of_range_is_rejected() {
        let data = NewRuleData {
            kind: RuleKind::Monthly,
            week_of_month: Some(6),
            weekday_of_month: Some(0),
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::InvalidWeekOfMonth(6)));
    }

    #[test]
    fn custom_requires_a_unit() {
        let data = NewRuleData {
            kind: RuleKind::Custom,
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::MissingCustomUnit));
    }

    #[test]
    fn daily_rejects_weekly_payload() {
        let data = NewRuleData {
            days_of_week: vec![0],
            ..Default::default()
        };
        assert_eq!(
            validate(&data),
            Err(ValidationError::UnexpectedField("days_of_week"))
        );
    }

    #[test]
    fn until_date_requires_a_date() {
        let data = NewRuleData {
            end_kind: EndKind::UntilDate,
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::MissingEndDate));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(0))]
    fn after_count_requires_a_positive_count(#[case] count: Option<u32>) {
        let data = NewRuleData {
            end_kind: EndKind::AfterCount,
            end_count: count,
            ..Default::default()
        };
        assert_eq!(validate(&data), Err(ValidationError::InvalidEndCount));
    }

    #[test]
    fn never_rejects_stray_end_payload() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let data = NewRuleData {
            end_date: Some(date),
            ..Default::default()
        };
        assert_eq!(
            validate(&data),
            Err(ValidationError::MismatchedEndPayload("end_date"))
        );
    }

    #[test]
    fn after_count_rejects_stray_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let data = NewRuleData {
            end_kind: EndKind::AfterCount,
            end_count: Some(3),
            end_date: Some(date),
            ..Default::default()
        };
        assert_eq!(
            validate(&data),
            Err(ValidationError::MismatchedEndPayload("end_date"))
        );
    }
}
