use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;

use crate::roster::Roster;

/// Save a roster snapshot as gzip-compressed bincode.
pub fn save_snapshot(roster: &Roster, filename: &str) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, roster)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(())
}

/// Load a roster snapshot written by [`save_snapshot`]. Derived fields come
/// back as saved; reclassify against the current date before serving them.
pub fn load_snapshot(filename: &str) -> std::io::Result<Roster> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let roster: Roster = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RecordInput;
    use chrono::NaiveDate;

    #[test]
    fn snapshot_round_trip_preserves_the_roster() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let mut roster = Roster::new();
        roster
            .add(
                &RecordInput {
                    person_code: Some("A-100".to_string()),
                    status_category: Some("留学".to_string()),
                    expiry_date: Some("2024-12-01".to_string()),
                    ..RecordInput::default()
                },
                today,
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.bin.gz");
        let path = path.to_str().unwrap();

        save_snapshot(&roster, path).unwrap();
        let restored = load_snapshot(path).unwrap();

        assert_eq!(restored.len(), 1);
        let record = &restored.records()[0];
        assert_eq!(record.person_code, "A-100");
        assert_eq!(
            record.expiry_date,
            Some(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap())
        );
    }

    #[test]
    fn loading_garbage_is_an_invalid_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bin.gz");
        std::fs::write(&path, b"not a snapshot").unwrap();
        assert!(load_snapshot(path.to_str().unwrap()).is_err());
    }
}
