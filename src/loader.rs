use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::record::normalize_digits;
use crate::roster::{RecordInput, Roster};

/// Column headers of the roster file, as produced by the processed-data
/// export. Ingest matches headers by name, so column order is free and
/// unknown columns are ignored.
const COL_PERSON_CODE: &str = "担当者コード";
const COL_NAME_LINE1: &str = "氏名１";
const COL_NAME_LINE2: &str = "氏名２";
const COL_STATUS_CATEGORY: &str = "在留資格";
const COL_NATIONALITY: &str = "国籍";
const COL_CARD_NUMBER: &str = "在留カード番号";
const COL_BIRTH_DATE: &str = "生年月日";
const COL_COHORT: &str = "期生";
const COL_GRANT_DATE: &str = "許可年月日";
const COL_EXPIRY_DATE: &str = "満了年月日";
const COL_ELAPSED_DAYS: &str = "既満了日数";
const COL_THRESHOLD1: &str = "設定期限1";
const COL_THRESHOLD2: &str = "設定期限2";
const COL_THRESHOLD3: &str = "設定期限3";

/// Load roster rows from CSV data.
///
/// The first row must be a header row; the expiry-date column is required,
/// everything else is optional. Full-width digits are normalized by the
/// store when the rows are materialized.
///
/// # Arguments
/// * `reader` - Any CSV byte source (a file, an upload body)
///
/// # Returns
/// * `Result<Vec<RecordInput>, Box<dyn Error>>` - One input per data row
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Vec<RecordInput>, Box<dyn Error>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = ColumnMap::resolve(&headers)?;

    let mut inputs = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        inputs.push(columns.input_from(&row));
    }
    Ok(inputs)
}

/// Load roster rows from a CSV file on disk.
pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Vec<RecordInput>, Box<dyn Error>> {
    let file = File::open(path)?;
    from_csv_reader(file)
}

/// Load a classified roster from a CSV file, recording the source filename.
///
/// Only `.csv` files are accepted; spreadsheet binary formats are not parsed
/// here - export the source workbook as CSV first.
pub fn load_roster(path: impl AsRef<Path>, today: NaiveDate) -> Result<Roster, Box<dyn Error>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => {
            let inputs = from_csv_path(path)?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.to_string());
            Ok(Roster::from_inputs(inputs, filename, today))
        }
        Some(ext) => Err(format!("unsupported file extension: {}", ext).into()),
        None => Err("file has no extension".into()),
    }
}

struct ColumnMap {
    person_code: Option<usize>,
    name_line1: Option<usize>,
    name_line2: Option<usize>,
    status_category: Option<usize>,
    nationality: Option<usize>,
    card_number: Option<usize>,
    birth_date: Option<usize>,
    cohort: Option<usize>,
    grant_date: Option<usize>,
    expiry_date: usize,
    elapsed_days: Option<usize>,
    threshold1: Option<usize>,
    threshold2: Option<usize>,
    threshold3: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self, Box<dyn Error>> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let expiry_date = find(COL_EXPIRY_DATE)
            .ok_or_else(|| format!("required column {} is missing", COL_EXPIRY_DATE))?;

        Ok(ColumnMap {
            person_code: find(COL_PERSON_CODE),
            name_line1: find(COL_NAME_LINE1),
            name_line2: find(COL_NAME_LINE2),
            status_category: find(COL_STATUS_CATEGORY),
            nationality: find(COL_NATIONALITY),
            card_number: find(COL_CARD_NUMBER),
            birth_date: find(COL_BIRTH_DATE),
            cohort: find(COL_COHORT),
            grant_date: find(COL_GRANT_DATE),
            expiry_date,
            elapsed_days: find(COL_ELAPSED_DAYS),
            threshold1: find(COL_THRESHOLD1),
            threshold2: find(COL_THRESHOLD2),
            threshold3: find(COL_THRESHOLD3),
        })
    }

    fn input_from(&self, row: &StringRecord) -> RecordInput {
        let text = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };
        let number = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(|v| normalize_digits(v.trim()))
                .and_then(|v| v.parse::<i64>().ok())
        };

        RecordInput {
            person_code: text(self.person_code),
            name_line1: text(self.name_line1),
            name_line2: text(self.name_line2),
            status_category: text(self.status_category),
            nationality: text(self.nationality),
            card_number: text(self.card_number),
            birth_date: text(self.birth_date),
            cohort: text(self.cohort),
            grant_date: text(self.grant_date),
            expiry_date: text(Some(self.expiry_date)),
            days_already_elapsed: text(self.elapsed_days),
            threshold1: number(self.threshold1),
            threshold2: number(self.threshold2),
            threshold3: number(self.threshold3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RowStatus;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    const SAMPLE: &str = "\
担当者コード,氏名１,氏名２,在留資格,国籍,期生,許可年月日,満了年月日,既満了日数,設定期限1,設定期限2,設定期限3
1001,グエン,NGUYEN VAN A,技能実習2号ロ,ベトナム,12,2023-04-01,2025-03-31,,90,60,30
1002,チャン,TRAN THI B,特定技能1号,ベトナム,８,2023/10/01,2024/04/20,365,90,60,30
1003,リ,LI WEI,技術・人文知識・国際業務,中国,,,,,,,
";

    #[test]
    fn parses_rows_with_header_mapping() {
        let roster = Roster::from_inputs(
            from_csv_reader(SAMPLE.as_bytes()).unwrap(),
            Some("sample.csv".to_string()),
            today(),
        );
        assert_eq!(roster.len(), 3);

        let first = &roster.records()[0];
        assert_eq!(first.person_code, "1001");
        assert_eq!(first.nationality, "ベトナム");
        assert_eq!(
            first.expiry_date,
            Some(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap())
        );
        // Trainee rows never carry an elapsed count.
        assert_eq!(first.days_already_elapsed, None);

        let second = &roster.records()[1];
        assert_eq!(second.days_already_elapsed, Some(365));
        assert_eq!(
            second.expiry_date,
            Some(NaiveDate::from_ymd_opt(2024, 4, 20).unwrap())
        );
        // Full-width cohort digits normalize on ingest.
        assert_eq!(second.cohort, "8");

        let third = &roster.records()[2];
        assert_eq!(third.expiry_date, None);
        assert_eq!(third.status, RowStatus::Unknown);
    }

    #[test]
    fn missing_expiry_column_is_an_error() {
        let csv = "担当者コード,氏名１\n1001,グエン\n";
        assert!(from_csv_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn column_order_is_free() {
        let csv = "満了年月日,担当者コード\n2024-12-01,2001\n";
        let inputs = from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].expiry_date.as_deref(), Some("2024-12-01"));
        assert_eq!(inputs[0].person_code.as_deref(), Some("2001"));
    }

    #[test]
    fn rejects_non_csv_extensions() {
        assert!(load_roster("roster.xlsx", today()).is_err());
        assert!(load_roster("roster", today()).is_err());
    }
}
