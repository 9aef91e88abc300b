//! CSV export of listed doses.

use crate::dose_id::format_instant;
use crate::{DoseOccurrence, DoseStatus, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    dose_id: &'a str,
    schedule_id: &'a str,
    medication_id: &'a str,
    medication_name: &'a str,
    recipient_id: &'a str,
    scheduled_for: String,
    status: &'static str,
    taken_at: Option<String>,
    taken_by_user_id: Option<&'a str>,
}

impl<'a> From<&'a DoseOccurrence> for CsvRow<'a> {
    fn from(dose: &'a DoseOccurrence) -> Self {
        CsvRow {
            dose_id: dose.dose_id.as_str(),
            schedule_id: &dose.schedule_id,
            medication_id: &dose.medication_id,
            medication_name: &dose.medication_name,
            recipient_id: &dose.recipient_id,
            scheduled_for: format_instant(dose.scheduled_for),
            status: match dose.status {
                DoseStatus::Scheduled => "scheduled",
                DoseStatus::Taken => "taken",
            },
            taken_at: dose.taken_at.map(format_instant),
            taken_by_user_id: dose.taken_by_user_id.as_deref(),
        }
    }
}

/// Append doses to a CSV file, writing headers only when the file is new
///
/// The file is fsynced before returning. Returns the number of rows written.
pub fn export_doses_csv(doses: &[DoseOccurrence], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Only a fresh file gets a header row
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for dose in doses {
        writer.serialize(CsvRow::from(dose))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} doses to {:?}", doses.len(), csv_path);
    Ok(doses.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DoseId;
    use chrono::{DateTime, TimeZone, Utc};

    fn dose(hour: u32, taken: bool) -> DoseOccurrence {
        let scheduled_for: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        DoseOccurrence {
            dose_id: DoseId::encode("sch-1", scheduled_for),
            schedule_id: "sch-1".into(),
            medication_id: "med-1".into(),
            recipient_id: "mom".into(),
            medication_name: "Lisinopril".into(),
            scheduled_for,
            status: if taken { DoseStatus::Taken } else { DoseStatus::Scheduled },
            taken_at: taken.then(|| scheduled_for + chrono::Duration::minutes(3)),
            taken_by_user_id: taken.then(|| "alice".to_string()),
        }
    }

    #[test]
    fn test_export_creates_file_with_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("out").join("doses.csv");

        let count = export_doses_csv(&[dose(8, true), dose(20, false)], &csv_path).unwrap();
        assert_eq!(count, 2);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "dose_id");
        assert_eq!(&headers[6], "status");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][5], "2024-01-01T08:00:00.000Z");
        assert_eq!(&rows[0][6], "taken");
        assert_eq!(&rows[0][7], "2024-01-01T08:03:00.000Z");
        assert_eq!(&rows[1][6], "scheduled");
        assert_eq!(&rows[1][8], "");
    }

    #[test]
    fn test_export_appends_without_second_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("doses.csv");

        export_doses_csv(&[dose(8, false)], &csv_path).unwrap();
        export_doses_csv(&[dose(20, false)], &csv_path).unwrap();

        let reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.into_records().count(), 2);
    }

    #[test]
    fn test_export_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("doses.csv");
        assert_eq!(export_doses_csv(&[], &csv_path).unwrap(), 0);
        assert!(csv_path.exists());
    }
}
