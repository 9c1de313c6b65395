use std::error::Error;
use std::fs;
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;

use residence_tracker::downloader;
use residence_tracker::loader;
use residence_tracker::record::{Record, RowStatus};
use residence_tracker::saving;

/// Batch front-end: load a roster CSV, print the deadline summary and the
/// alert list, and optionally write the export workbooks.
#[derive(Parser)]
#[command(name = "residence-tracker", version, about = "Residence-status deadline report")]
struct Args {
    /// Roster CSV file
    file: PathBuf,

    /// Write the processed workbook here
    #[arg(long)]
    processed_out: Option<PathBuf>,

    /// Write the alert-list workbook here
    #[arg(long)]
    alert_out: Option<PathBuf>,

    /// Save a compressed roster snapshot here
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let today = Local::now().date_naive();

    let roster = loader::load_roster(&args.file, today)?;

    println!("{}", "=".repeat(60));
    println!("在留資格管理サマリー - {}", args.file.display());
    println!("{}", "=".repeat(60));

    let summary = roster.summary();
    println!("総データ件数: {}件", summary.total);
    println!("  期限切れ: {}件", summary.expired);
    println!("  30日以内: {}件", summary.days_30_count);
    println!("  31-60日以内: {}件", summary.days_60_count);
    println!("  61-90日以内: {}件", summary.days_90_count);
    println!("  期限日超過: {}件", summary.deadline_passed);
    println!("  特定技能1号上限超過: {}件", summary.skill1_limit_count);
    println!();

    let alerts = roster.alerts();
    if alerts.is_empty() {
        println!("期限日を超過しているデータはありません");
    } else {
        println!("アラート対象 ({}件):", alerts.len());
        for record in &alerts {
            print_alert_line(record);
        }
    }

    if let Some(path) = &args.processed_out {
        let buffer = downloader::processed_xlsx(roster.records())?;
        fs::write(path, buffer)?;
        println!("処理済みデータを保存しました: {}", path.display());
    }

    if let Some(path) = &args.alert_out {
        match downloader::alert_xlsx(&alerts) {
            Ok(buffer) => {
                fs::write(path, buffer)?;
                println!("アラートリストを保存しました: {}", path.display());
            }
            Err(e) => println!("アラートリストは出力されませんでした: {}", e),
        }
    }

    if let Some(path) = &args.snapshot_out {
        saving::save_snapshot(&roster, path.to_string_lossy().as_ref())?;
        println!("スナップショットを保存しました: {}", path.display());
    }

    Ok(())
}

fn print_alert_line(record: &Record) {
    let marker = match record.status {
        RowStatus::Expired => "[!] 期限切れ",
        RowStatus::Urgent => "[緊急]",
        RowStatus::Warning => "[警告]",
        _ => "[注意]",
    };
    let days = record
        .days_until_expiry
        .map(|d| format!("{}日", d))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {} {} ({}) 残り{}",
        marker, record.person_code, record.name_line2, record.status_category, days
    );
}
