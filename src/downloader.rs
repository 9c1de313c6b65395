use std::error::Error;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::record::{CategoryKind, Record};

lazy_static! {
    // RFC 5987 extended form: filename*=UTF-8''percent-encoded
    static ref FILENAME_EXT_REGEX: Regex =
        Regex::new(r#"(?i)filename\*\s*=\s*utf-8''([^;\r\n"]+)"#).unwrap();
    // Plain forms: filename="quoted" or a bare token
    static ref FILENAME_QUOTED_REGEX: Regex =
        Regex::new(r#"(?i)filename\s*=\s*"([^"]*)""#).unwrap();
    static ref FILENAME_TOKEN_REGEX: Regex =
        Regex::new(r#"(?i)filename\s*=\s*([^;\s"]+)"#).unwrap();
}

/// Build a `Content-Disposition` attachment header value carrying both the
/// plain (ASCII fallback) and the RFC 5987 encoded filename forms.
///
/// # Arguments
/// * `filename` - The download filename, may contain non-ASCII characters
///
/// # Examples
/// ```
/// use residence_tracker::downloader::content_disposition;
///
/// let header = content_disposition("plain.xlsx");
/// assert!(header.contains("filename=\"plain.xlsx\""));
/// assert!(header.contains("filename*=UTF-8''plain.xlsx"));
/// ```
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Extract the download filename from a `Content-Disposition` header.
///
/// The RFC 5987 `filename*=UTF-8''…` form is preferred when both forms are
/// present; the quoted and bare `filename=` forms are the fallbacks.
/// Returns `None` when no filename parameter is present or the encoded form
/// does not decode to valid UTF-8.
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(captures) = FILENAME_EXT_REGEX.captures(header) {
        if let Ok(decoded) = urlencoding::decode(&captures[1]) {
            return Some(decoded.into_owned());
        }
    }
    if let Some(captures) = FILENAME_QUOTED_REGEX.captures(header) {
        return Some(captures[1].to_string());
    }
    FILENAME_TOKEN_REGEX
        .captures(header)
        .map(|captures| captures[1].to_string())
}

/// Column headers of the exported workbook, ingest columns first, computed
/// columns after.
const EXPORT_HEADERS: [&str; 18] = [
    "担当者コード",
    "氏名１",
    "氏名２",
    "在留資格",
    "国籍",
    "在留カード番号",
    "生年月日",
    "期生",
    "許可年月日",
    "満了年月日",
    "既満了日数",
    "満了日数",
    "設定期限1",
    "設定期限2",
    "設定期限3",
    "期限日1",
    "期限日2",
    "期限日3",
];

/// Export the processed roster as an XLSX workbook in memory.
///
/// Dates render as `yyyy/mm/dd`, bare-number cohorts gain the 期 suffix and
/// the manual elapsed-days column follows the per-category blanking rules,
/// matching the workbook format the ingest side round-trips with.
pub fn processed_xlsx(records: &[Record]) -> Result<Vec<u8>, Box<dyn Error>> {
    write_workbook(records)
}

/// Export the alert subset as an XLSX workbook in memory.
///
/// # Errors
/// Exporting an empty alert set is an error so callers surface "nothing past
/// its deadline" instead of producing an empty file.
pub fn alert_xlsx(records: &[Record]) -> Result<Vec<u8>, Box<dyn Error>> {
    if records.is_empty() {
        return Err("no records past their deadlines".into());
    }
    write_workbook(records)
}

fn write_workbook(records: &[Record]) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;
        worksheet.write_string(row, 0, record.person_code.as_str())?;
        worksheet.write_string(row, 1, record.name_line1.as_str())?;
        worksheet.write_string(row, 2, record.name_line2.as_str())?;
        worksheet.write_string(row, 3, record.status_category.as_str())?;
        worksheet.write_string(row, 4, record.nationality.as_str())?;
        worksheet.write_string(row, 5, record.card_number.as_str())?;
        worksheet.write_string(row, 6, format_date(record.birth_date).as_str())?;
        worksheet.write_string(row, 7, record.cohort_display().as_str())?;
        worksheet.write_string(row, 8, format_date(record.grant_date).as_str())?;
        worksheet.write_string(row, 9, format_date(record.expiry_date).as_str())?;
        if let Some(days) = export_elapsed_days(record) {
            worksheet.write_number(row, 10, days as f64)?;
        }
        if let Some(days) = record.cumulative_days {
            worksheet.write_number(row, 11, days as f64)?;
        }
        for (offset, threshold) in record.thresholds.iter().enumerate() {
            worksheet.write_number(row, (12 + offset) as u16, *threshold as f64)?;
        }
        for (offset, slot) in record.deadlines.iter().enumerate() {
            worksheet.write_string(row, (15 + offset) as u16, format_date(slot.due_date).as_str())?;
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

/// Export the roster as CSV with the ingest column set, so the output can be
/// uploaded back unchanged.
pub fn to_csv(records: &[Record]) -> Result<String, Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "担当者コード",
        "氏名１",
        "氏名２",
        "在留資格",
        "国籍",
        "在留カード番号",
        "生年月日",
        "期生",
        "許可年月日",
        "満了年月日",
        "既満了日数",
        "設定期限1",
        "設定期限2",
        "設定期限3",
    ])?;

    for record in records {
        writer.write_record([
            record.person_code.clone(),
            record.name_line1.clone(),
            record.name_line2.clone(),
            record.status_category.clone(),
            record.nationality.clone(),
            record.card_number.clone(),
            iso_date(record.birth_date),
            record.cohort.clone(),
            iso_date(record.grant_date),
            iso_date(record.expiry_date),
            record
                .days_already_elapsed
                .map(|d| d.to_string())
                .unwrap_or_default(),
            record.thresholds[0].to_string(),
            record.thresholds[1].to_string(),
            record.thresholds[2].to_string(),
        ])?;
    }

    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

/// Workbook rendering of a date: `yyyy/mm/dd`, `-` when absent.
fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%Y/%m/%d").to_string(),
        None => "-".to_string(),
    }
}

fn iso_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Per-category blanking of the manual elapsed-days column on export:
/// trainee and tier-2 are always blank, tier-1 always shows a number (zero
/// when unset), other categories drop zero and blank values.
fn export_elapsed_days(record: &Record) -> Option<i64> {
    match record.category_kind() {
        CategoryKind::Trainee | CategoryKind::SkilledWorkerTier2 => None,
        CategoryKind::SkilledWorkerTier1 => Some(record.days_already_elapsed.unwrap_or(0)),
        CategoryKind::Other => record.days_already_elapsed.filter(|&days| days != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    fn sample(code: &str, category: &str) -> Record {
        let mut record = Record::new(1);
        record.person_code = code.to_string();
        record.status_category = category.to_string();
        record.cohort = "12".to_string();
        record.expiry_date = NaiveDate::from_ymd_opt(2024, 7, 10);
        classify(&mut record, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        record
    }

    #[test]
    fn parses_the_encoded_filename_form() {
        let name =
            parse_content_disposition("attachment; filename*=UTF-8''%E5%9C%A8%E7%95%99.xlsx");
        assert_eq!(name.as_deref(), Some("在留.xlsx"));
    }

    #[test]
    fn parses_the_plain_filename_forms() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="plain.xlsx""#).as_deref(),
            Some("plain.xlsx")
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=bare.xlsx").as_deref(),
            Some("bare.xlsx")
        );
        assert_eq!(parse_content_disposition("attachment"), None);
    }

    #[test]
    fn prefers_the_encoded_form_when_both_are_present() {
        let header = concat!(
            "attachment; filename=\"fallback.xlsx\"; ",
            "filename*=UTF-8''%E5%9C%A8%E7%95%99.xlsx"
        );
        assert_eq!(
            parse_content_disposition(header).as_deref(),
            Some("在留.xlsx")
        );
    }

    #[test]
    fn header_round_trips_non_ascii_filenames() {
        let header = content_disposition("アラートリスト.xlsx");
        assert_eq!(
            parse_content_disposition(&header).as_deref(),
            Some("アラートリスト.xlsx")
        );
    }

    #[test]
    fn processed_workbook_is_not_empty() {
        let records = vec![sample("A-100", "技術・人文知識・国際業務")];
        let buffer = processed_xlsx(&records).unwrap();
        assert!(!buffer.is_empty());
    }

    #[test]
    fn alert_export_refuses_an_empty_set() {
        assert!(alert_xlsx(&[]).is_err());
        let records = vec![sample("A-100", "技術・人文知識・国際業務")];
        assert!(alert_xlsx(&records).is_ok());
    }

    #[test]
    fn csv_round_trips_through_the_loader() {
        let mut tier1 = sample("B-200", "特定技能1号");
        tier1.days_already_elapsed = Some(365);
        let records = vec![sample("A-100", "技術・人文知識・国際業務"), tier1];

        let csv = to_csv(&records).unwrap();
        let inputs = crate::loader::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].person_code.as_deref(), Some("A-100"));
        assert_eq!(inputs[1].days_already_elapsed.as_deref(), Some("365"));
        assert_eq!(inputs[1].expiry_date.as_deref(), Some("2024-07-10"));
    }
}
