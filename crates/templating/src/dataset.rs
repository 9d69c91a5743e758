//! Tabular datasets for parameterized runs

use std::collections::BTreeMap;
use std::path::Path;

use crate::TemplateError;

/// A loaded dataset: one variable map per row, headers as names.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    rows: Vec<BTreeMap<String, String>>,
}

impl Dataset {
    pub fn from_csv_path(path: &Path) -> Result<Self, TemplateError> {
        let reader = csv::Reader::from_path(path)
            .map_err(|e| TemplateError::Dataset(e.to_string()))?;
        Self::from_reader(reader)
    }

    pub fn from_csv_str(data: &str) -> Result<Self, TemplateError> {
        Self::from_reader(csv::Reader::from_reader(data.as_bytes()))
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, TemplateError> {
        let headers = reader
            .headers()
            .map_err(|e| TemplateError::Dataset(e.to_string()))?
            .clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| TemplateError::Dataset(e.to_string()))?;
            let row = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect();
            rows.push(row);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &BTreeMap<String, String>> {
        self.rows.iter()
    }

    pub fn row(&self, idx: usize) -> Option<&BTreeMap<String, String>> {
        self.rows.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_into_row_maps() {
        let dataset = Dataset::from_csv_str("amount,stage\n100000,Prospecting\n5000,Closed\n")
            .unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.row(0).unwrap()["amount"], "100000");
        assert_eq!(dataset.row(1).unwrap()["stage"], "Closed");
    }

    #[test]
    fn empty_dataset_is_fine() {
        let dataset = Dataset::from_csv_str("a,b\n").unwrap();
        assert!(dataset.is_empty());
    }
}
