mod esri_shape;
mod geojson;

use crate::crs::ReferenceSystem;
use crate::error::ExportError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

pub use esri_shape::ShapefileDriver;
pub use geojson::GeoJsonDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Text,
    Integer,
    Date,
    Time,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefn {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDefn {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Text rendering used by formats without a native type for the value.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Integer(value) => value.to_string(),
            FieldValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            FieldValue::Time(value) => value.format("%H:%M:%S").to_string(),
            FieldValue::DateTime(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// A point plus its attribute values. Attributes without a value are omitted
/// and written as null.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub x: f64,
    pub y: f64,
    attributes: Vec<(String, FieldValue)>,
}

impl Feature {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            attributes: Vec::new(),
        }
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

pub trait OutputDriver {
    fn name(&self) -> &'static str;

    /// Deletes whatever a previous run left at `path`. Missing files are fine.
    fn remove_existing(&self, path: &Path, layer_name: &str) -> Result<(), ExportError>;

    fn create_layer(
        &self,
        path: &Path,
        layer_name: &str,
        srs: &ReferenceSystem,
    ) -> Result<Box<dyn LayerWriter>, ExportError>;
}

pub trait LayerWriter {
    fn create_field(&mut self, defn: &FieldDefn) -> Result<(), ExportError>;

    fn write_feature(&mut self, feature: &Feature) -> Result<(), ExportError>;

    fn finish(self: Box<Self>) -> Result<(), ExportError>;
}

pub fn available_drivers() -> Vec<Box<dyn OutputDriver>> {
    vec![Box::new(GeoJsonDriver), Box::new(ShapefileDriver)]
}

/// Looks a driver up by name, ignoring case and any quotes around it.
pub fn driver_by_name(name: &str) -> Result<Box<dyn OutputDriver>, ExportError> {
    let wanted = name.replace(['\'', '"'], "");
    let wanted = wanted.trim();
    available_drivers()
        .into_iter()
        .find(|driver| driver.name().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ExportError::UnsupportedFormat(wanted.to_string()))
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<(), ExportError> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed existing output {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ExportError::OverwriteFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn driver_lookup_ignores_case_and_quotes() {
        assert_eq!(driver_by_name("GeoJSON").expect("geojson").name(), "GeoJSON");
        assert_eq!(
            driver_by_name("\"esri shapefile\"").expect("shapefile").name(),
            "ESRI Shapefile"
        );
        assert!(matches!(
            driver_by_name("KML"),
            Err(ExportError::UnsupportedFormat(name)) if name == "KML"
        ));
    }

    #[test]
    fn feature_set_replaces_existing_value() {
        let mut feature = Feature::new(1.0, 2.0);
        feature.set("file", FieldValue::Text("a.jpg".to_string()));
        feature.set("file", FieldValue::Text("b.jpg".to_string()));
        assert_eq!(
            feature.get("file"),
            Some(&FieldValue::Text("b.jpg".to_string()))
        );
        assert_eq!(feature.get("altitude"), None);
    }

    #[test]
    fn removing_missing_output_is_not_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photos.geojson");
        remove_if_exists(&path).expect("missing is fine");

        fs::write(&path, b"{}").expect("write");
        remove_if_exists(&path).expect("remove");
        assert!(!path.exists());
    }

    #[test]
    fn temporal_values_render_as_iso_text() {
        let date = NaiveDate::from_ymd_opt(2008, 5, 1).expect("date");
        let time = NaiveTime::from_hms_opt(12, 30, 45).expect("time");
        assert_eq!(FieldValue::Date(date).as_text(), "2008-05-01");
        assert_eq!(FieldValue::Time(time).as_text(), "12:30:45");
        assert_eq!(
            FieldValue::DateTime(date.and_time(time)).as_text(),
            "2008-05-01T12:30:45"
        );
    }
}
