use crate::domain::property::{SoldRecord, parse_land_size};
use crate::domain::repositories::HistoricalRecordSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use tracing::{info, warn};

/// Row layout of a sold-history export.
#[derive(Debug, Deserialize)]
struct SoldRow {
    property_id: String,
    suburb: String,
    sale_price: Option<i64>,
    sale_date: Option<String>,
    beds: Option<i64>,
    baths: Option<i64>,
    cars: Option<i64>,
    land_size: Option<String>,
    property_type: Option<String>,
}

impl From<SoldRow> for SoldRecord {
    fn from(row: SoldRow) -> Self {
        SoldRecord {
            property_id: row.property_id,
            suburb: row.suburb,
            sale_price: row.sale_price,
            sale_date: row.sale_date.filter(|d| !d.trim().is_empty()),
            beds: row.beds,
            baths: row.baths,
            cars: row.cars,
            land_size: row.land_size.as_deref().and_then(parse_land_size),
            property_type: row.property_type.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Sold records read from a CSV file with a header row:
/// `property_id,suburb,sale_price,sale_date,beds,baths,cars,land_size,property_type`.
pub struct CsvHistoricalSource {
    path: PathBuf,
}

impl CsvHistoricalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_records(&self) -> Result<Vec<SoldRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open sold history {:?}", self.path))?;
        let records = parse_records(BufReader::new(file))?;
        info!("Loaded {} sold records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

/// Malformed rows are skipped with a warning; training counts what survives.
fn parse_records<R: Read>(reader: R) -> Result<Vec<SoldRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for (line, result) in rdr.deserialize::<SoldRow>().enumerate() {
        match result {
            Ok(row) => records.push(SoldRecord::from(row)),
            Err(e) => warn!("Skipping CSV row {}: {}", line + 2, e),
        }
    }
    Ok(records)
}

#[async_trait]
impl HistoricalRecordSource for CsvHistoricalSource {
    async fn sold_records(&self) -> Result<Vec<SoldRecord>> {
        self.read_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
property_id,suburb,sale_price,sale_date,beds,baths,cars,land_size,property_type
a1,CASTLE HILL,1650000,2024-02-14,4,2,2,\"1,050 m²\",House
a2,Baulkham Hills,780000,2024-03-01T00:00:00,2,1,1,,Apartment
a3,CASTLE HILL,not-a-price,2024-03-09,3,2,1,300m²,Townhouse
a4,CASTLE HILL,,,,,,,
";

    #[test]
    fn test_parse_rows_and_land_text() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].land_size, Some(1050.0));
        assert_eq!(records[0].sale_price, Some(1_650_000));
        assert_eq!(records[1].land_size, None);
        assert_eq!(records[1].sale_date.as_deref(), Some("2024-03-01T00:00:00"));
        assert_eq!(records[1].property_type.as_deref(), Some("Apartment"));

        // Empty cells stay missing and are left for training to count
        assert_eq!(records[2].property_id, "a4");
        assert_eq!(records[2].sale_price, None);
        assert_eq!(records[2].sale_date, None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = CsvHistoricalSource::new("/nonexistent/propval/sold.csv");
        assert!(tokio_test::block_on(source.sold_records()).is_err());
    }
}
