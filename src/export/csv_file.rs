//! CSV exporter.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{ExportError, Exporter};
use crate::models::NormalizedRecord;

/// Column order of every export
pub const CSV_HEADER: [&str; 8] = [
    "ID",
    "Title",
    "Abstract",
    "Authors",
    "Publication Date",
    "Journal",
    "DOI",
    "Source",
];

/// Map a record onto the export columns
pub fn export_row(record: &NormalizedRecord) -> [String; 8] {
    [
        record.native_id().to_string(),
        record.title().to_string(),
        record.abstract_text().to_string(),
        record.authors().join("; "),
        record.publication_date(),
        record.venue().to_string(),
        record.doi().unwrap_or_default().to_string(),
        record.kind().label().to_string(),
    ]
}

/// Writes `<output_dir>/<target>.csv`
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn render(records: &[NormalizedRecord]) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for record in records {
            writer.write_record(export_row(record))?;
        }
        writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

#[async_trait]
impl Exporter for CsvExporter {
    async fn export(
        &self,
        records: &[NormalizedRecord],
        target: &str,
    ) -> Result<PathBuf, ExportError> {
        if target.is_empty() || target.contains(['/', '\\']) {
            return Err(ExportError::InvalidTarget(target.to_string()));
        }

        let body = Self::render(records)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self.output_dir.join(format!("{}.csv", target));
        tokio::fs::write(&path, body).await?;

        tracing::info!("Exported {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PubMedArticle, ScholarPaper};

    fn sample_records() -> Vec<NormalizedRecord> {
        let mut article = PubMedArticle::new("111", "Video visits, revisited");
        article.abstract_text = "Line one \"quoted\"".to_string();
        article.authors = vec!["Smith Jane".to_string(), "Doe John".to_string()];
        article.publication_date = "2021 Mar".to_string();
        article.journal = "J Telemed".to_string();
        article.doi = Some("10.1000/1".to_string());

        let mut paper = ScholarPaper::new("A1", "Virtual wards");
        paper.authors = vec!["Lee Kim".to_string()];
        paper.year = Some(2022);
        paper.venue = "BMJ".to_string();

        vec![article.into(), paper.into()]
    }

    #[test]
    fn test_export_row() {
        let records = sample_records();

        assert_eq!(
            export_row(&records[0]),
            [
                "111",
                "Video visits, revisited",
                "Line one \"quoted\"",
                "Smith Jane; Doe John",
                "2021 Mar",
                "J Telemed",
                "10.1000/1",
                "PubMed",
            ]
        );
        assert_eq!(
            export_row(&records[1]),
            ["A1", "Virtual wards", "", "Lee Kim", "2022", "BMJ", "", "Semantic Scholar"]
        );
    }

    #[tokio::test]
    async fn test_export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());

        let path = exporter
            .export(&sample_records(), "Telehealth_healthcare_run")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("Telehealth_healthcare_run.csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Video visits, revisited");
        assert_eq!(&rows[0][2], "Line one \"quoted\"");
        assert_eq!(&rows[1][7], "Semantic Scholar");
    }

    #[tokio::test]
    async fn test_export_empty_set_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("nested"));

        let path = exporter.export(&[], "empty").await.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            contents.trim_end(),
            "ID,Title,Abstract,Authors,Publication Date,Journal,DOI,Source"
        );
    }

    #[tokio::test]
    async fn test_export_rejects_path_target() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());

        let result = exporter.export(&[], "../escape").await;
        assert!(matches!(result, Err(ExportError::InvalidTarget(_))));
    }
}
