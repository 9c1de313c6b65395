#![cfg(not(tarpaulin_include))]

use chrono::NaiveDate;

use residence_tracker::calendar::{self, MonthRef};
use residence_tracker::downloader;
use residence_tracker::loader;
use residence_tracker::record::Level;
use residence_tracker::roster::{RecordInput, Roster};
use residence_tracker::tracker::ChangeTracker;
use residence_tracker::view::{Filter, SortColumn, ViewState};

const SAMPLE_CSV: &str = "\
担当者コード,氏名１,氏名２,在留資格,国籍,許可年月日,満了年月日,既満了日数,設定期限1,設定期限2,設定期限3
1001,グエン,NGUYEN VAN A,技能実習2号ロ,ベトナム,2023-04-01,2024-04-15,,90,60,30
1002,チャン,TRAN THI B,特定技能1号,ベトナム,2023-10-01,2024-12-01,1650,90,60,30
1003,リ,LI WEI,技術・人文知識・国際業務,中国,2022-06-01,2024-03-01,,90,60,30
1004,キム,KIM MINSU,留学,韓国,,,,,,
";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
}

fn load_sample() -> Roster {
    let inputs = loader::from_csv_reader(SAMPLE_CSV.as_bytes()).expect("sample CSV parses");
    Roster::from_inputs(inputs, Some("sample.csv".to_string()), today())
}

fn test_load_and_classify() {
    println!("\n====== Testing load and classify ======");
    let roster = load_sample();
    assert_eq!(roster.len(), 4);

    let urgent = &roster.records()[0];
    assert_eq!(urgent.days_until_expiry, Some(14));
    assert_eq!(urgent.level, Level::Level1);
    println!("✓ 14-day record classified level1");

    let expired = &roster.records()[2];
    assert!(expired.days_until_expiry.unwrap() < 0);
    println!("✓ expired record carries negative days");

    let unknown = &roster.records()[3];
    assert_eq!(unknown.days_until_expiry, None);
    println!("✓ record without expiry stays unknown");
}

fn test_filters_and_sort() {
    println!("\n====== Testing filters and sort ======");
    let roster = load_sample();
    let mut view = ViewState::new();

    view.apply_filter(Filter::Skill1Limit);
    let flagged = view.visible(roster.records());
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].person_code, "1002");
    println!("✓ skill1_limit filter flags the capped record");

    view.apply_filter(Filter::All);
    view.toggle_sort(SortColumn::DaysUntilExpiry);
    let rows = view.visible(roster.records());
    assert_eq!(rows.first().map(|r| r.person_code.clone()).unwrap(), "1003");
    assert_eq!(rows.last().map(|r| r.person_code.clone()).unwrap(), "1004");
    println!("✓ ascending sort puts the unknown record last");
}

fn test_calendar_projection() {
    println!("\n====== Testing calendar projection ======");
    let roster = load_sample();
    // Record 1001 expires 2024-04-15: the 30-day slot lands on 2024-03-16.
    let march = calendar::project(roster.records(), MonthRef::new(2024, 3).unwrap());
    assert!(march.contains_key("2024-03-16"));
    assert_eq!(march["2024-03-16"].deadline3.len(), 1);
    println!("✓ march projection buckets the 30-day slot");
}

fn test_mutations_and_tracker() {
    println!("\n====== Testing mutations and tracker ======");
    let mut roster = load_sample();
    let mut tracker = ChangeTracker::new();
    assert!(!tracker.is_dirty());

    let id = roster
        .add(
            &RecordInput {
                person_code: Some("1005".to_string()),
                status_category: Some("留学".to_string()),
                expiry_date: Some("2024-10-01".to_string()),
                ..RecordInput::default()
            },
            today(),
        )
        .expect("add succeeds");
    tracker.record_change(chrono::Utc::now());
    assert!(tracker.is_dirty());
    println!("✓ add marks the tracker dirty");

    roster.delete(id).expect("delete succeeds");
    tracker.record_export(chrono::Utc::now(), "processed.xlsx");
    assert!(!tracker.is_dirty());
    println!("✓ export clears the tracker");
}

fn test_export_headers() {
    println!("\n====== Testing export filename headers ======");
    let header = downloader::content_disposition("在留資格管理_processed.xlsx");
    let parsed = downloader::parse_content_disposition(&header);
    assert_eq!(parsed.as_deref(), Some("在留資格管理_processed.xlsx"));
    println!("✓ content-disposition round trip keeps the UTF-8 name");
}

fn main() {
    test_load_and_classify();
    test_filters_and_sort();
    test_calendar_projection();
    test_mutations_and_tracker();
    test_export_headers();
    println!("\nAll roster scenario checks passed");
}
