//! Week and month averaging end to end
//!
//! Daily grids come from an in-memory source keyed by date, so every
//! window can be checked by hand.

use chrono::NaiveDate;
use ndarray::{array, Array2};
use precip_verification::aggregate::lead::LeadTimeAggregator;
use precip_verification::aggregate::windows::{
    month_week_ends, overlap_days, PeriodFields, PeriodSource, WindowSettings, WindowVerifier,
};
use precip_verification::aggregate::{accumulate, finalize, RunningTable};
use precip_verification::verify::verify_period;
use precip_verification::{BinTable, ContingencyCount, ThresholdClassifier, VerifyError};
use std::collections::HashMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[derive(Default)]
struct MemorySource {
    days: HashMap<NaiveDate, PeriodFields>,
    broken: Vec<NaiveDate>,
}

impl MemorySource {
    fn insert(&mut self, day: NaiveDate, forecast: Array2<f64>, observation: Array2<f64>) {
        self.days.insert(day, PeriodFields { forecast, observation });
    }
}

impl PeriodSource for MemorySource {
    fn load(&self, day: NaiveDate) -> Result<Option<PeriodFields>, VerifyError> {
        if self.broken.contains(&day) {
            return Err(VerifyError::MissingPeriodData {
                period: format!("{} (corrupt file)", day),
            });
        }
        Ok(self.days.get(&day).cloned())
    }
}

// --- Offsets --------------------------------------------------------------

#[test]
fn test_week_average_pod_divides_by_six_when_one_day_has_no_events() {
    let days = [
        ContingencyCount::new(2, 2, 1, 5),
        ContingencyCount::new(3, 1, 0, 5),
        ContingencyCount::new(0, 0, 3, 7), // hit = miss = 0
        ContingencyCount::new(1, 3, 2, 4),
        ContingencyCount::new(4, 4, 0, 2),
        ContingencyCount::new(5, 0, 5, 0),
        ContingencyCount::new(1, 1, 1, 7),
    ];
    let running = days.iter().fold(RunningTable::new("low"), accumulate);
    let row = finalize(&running).expect("seven periods");

    let defined: Vec<f64> = days.iter().filter_map(|d| d.pod().ok()).collect();
    assert_eq!(defined.len(), 6);
    let expected = defined.iter().map(|p| p * 100.0).sum::<f64>() / 6.0;
    let wrong = defined.iter().map(|p| p * 100.0).sum::<f64>() / 7.0;
    let pod = row.pod.expect("defined on six days");
    assert!((pod - expected).abs() < 1e-9);
    assert!((pod - wrong).abs() > 1.0);
}

// --- Week windows ---------------------------------------------------------

#[test]
fn test_week_with_missing_and_corrupt_days() {
    let mut source = MemorySource::default();
    // Perfect forecast on Mon and Wed, all false alarms on Fri.
    source.insert(date(2024, 7, 1), array![[12.0, 0.0]], array![[12.0, 0.0]]);
    source.insert(date(2024, 7, 3), array![[12.0, 0.0]], array![[12.0, 0.0]]);
    source.insert(date(2024, 7, 5), array![[12.0, 3.0]], array![[0.0, 0.0]]);
    source.broken.push(date(2024, 7, 6));

    let bins = BinTable::standard();
    let verifier = WindowVerifier::new(&source, &bins, ThresholdClassifier::default(), WindowSettings::default());
    let week = verifier.week_average(date(2024, 7, 7)).expect("three usable days");

    assert_eq!(week.start, date(2024, 7, 1));
    assert_eq!(week.periods_used, 3);
    assert!(week.periods_skipped.contains(&date(2024, 7, 6)));

    let total = week.row("total").expect("total row");
    // POD undefined on Friday: mean over Mon and Wed only.
    assert_eq!(total.pod, Some(100.0));
    // FAR defined on all three days: (0 + 0 + 100) / 3.
    let far = total.far.expect("defined");
    assert!((far - 100.0 / 3.0).abs() < 1e-9);
    assert!((total.false_alarm - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_week_rows_match_single_day_when_only_one_day_present() {
    let fcst = array![[0.0, 6.0, 22.0], [40.0, 70.0, 0.0]];
    let obs = array![[1.0, 8.0, 30.0], [36.0, 20.0, 0.0]];
    let mut source = MemorySource::default();
    source.insert(date(2024, 1, 10), fcst.clone(), obs.clone());

    let bins = BinTable::standard();
    let classifier = ThresholdClassifier::default();
    let verifier = WindowVerifier::new(&source, &bins, classifier, WindowSettings::default());
    let week = verifier.week_average(date(2024, 1, 14)).expect("one day");
    let day = verify_period(&classifier, &bins, fcst.view(), obs.view()).expect("same shape");
    assert_eq!(week.rows, day.rows);
}

// --- Month windows --------------------------------------------------------

#[test]
fn test_month_uses_boundary_weeks_with_enough_overlap() {
    let mut source = MemorySource::default();
    // 2 June 2024 is a Sunday: its week has five May days, two June days.
    source.insert(date(2024, 5, 28), array![[10.0]], array![[10.0]]);
    source.insert(date(2024, 6, 12), array![[10.0]], array![[0.0]]);

    let bins = BinTable::standard();
    let verifier = WindowVerifier::new(&source, &bins, ThresholdClassifier::default(), WindowSettings::default());

    let may = verifier.month_average(2024, 5).expect("boundary week counts for May");
    assert_eq!(may.periods_used, 1);
    assert_eq!(may.end, date(2024, 6, 2));
    assert_eq!(may.row("total").and_then(|r| r.pod), Some(100.0));

    let june = verifier.month_average(2024, 6).expect("mid-June week");
    assert_eq!(june.periods_used, 1);
    assert_eq!(june.row("total").and_then(|r| r.far), Some(100.0));
    // The only June week has no observed rain, so POD stays undefined.
    assert_eq!(june.row("total").and_then(|r| r.pod), None);
}

#[test]
fn test_four_three_split_week_counts_for_both_months() {
    // 3 March 2024 is a Sunday: 26-29 February and 1-3 March.
    let settings = WindowSettings::default();
    let boundary = date(2024, 3, 3);
    assert_eq!(overlap_days(boundary, 7, 2024, 2), 4);
    assert_eq!(overlap_days(boundary, 7, 2024, 3), 3);

    let feb = month_week_ends(2024, 2, &settings).expect("valid month");
    let mar = month_week_ends(2024, 3, &settings).expect("valid month");
    assert_eq!(feb.last(), Some(&boundary));
    assert_eq!(mar.first(), Some(&boundary));
    assert_eq!(
        feb,
        vec![date(2024, 2, 4), date(2024, 2, 11), date(2024, 2, 18), date(2024, 2, 25), boundary]
    );
}

#[test]
fn test_five_two_split_week_only_counts_for_longer_side() {
    // 2 June 2024 is a Sunday: 27-31 May and 1-2 June.
    let settings = WindowSettings::default();
    let boundary = date(2024, 6, 2);
    assert_eq!(overlap_days(boundary, 7, 2024, 6), 2);

    let may = month_week_ends(2024, 5, &settings).expect("valid month");
    let june = month_week_ends(2024, 6, &settings).expect("valid month");
    assert!(may.contains(&boundary));
    assert!(!june.contains(&boundary));
    assert_eq!(june.first(), Some(&date(2024, 6, 9)));
}

#[test]
fn test_month_without_data_is_empty_window() {
    let source = MemorySource::default();
    let bins = BinTable::standard();
    let verifier = WindowVerifier::new(&source, &bins, ThresholdClassifier::default(), WindowSettings::default());
    assert!(matches!(
        verifier.month_average(2024, 2),
        Err(VerifyError::EmptyWindow { .. })
    ));
}

// --- Lead days ------------------------------------------------------------

#[test]
fn test_lead_time_rows_from_daily_verification() {
    let bins = BinTable::standard();
    let classifier = ThresholdClassifier::default();
    let obs = array![[0.0, 12.0]];
    let mut leads = LeadTimeAggregator::new(&bins, 5);
    for (lead, fcst) in [(1, array![[0.0, 12.0]]), (2, array![[0.0, 0.0]])] {
        let day = verify_period(&classifier, &bins, fcst.view(), obs.view()).expect("same shape");
        leads.add(lead, &day.rows).expect("valid lead");
    }
    let out = leads.finalize().expect("two leads");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].rows[0].pod, Some(100.0));
    assert_eq!(out[1].rows[0].pod, Some(0.0));
}
