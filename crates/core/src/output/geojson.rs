use super::{remove_if_exists, Feature, FieldDefn, FieldKind, FieldValue, LayerWriter, OutputDriver};
use crate::crs::ReferenceSystem;
use crate::error::ExportError;
use crate::photo::EPSG_WGS84;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct GeoJsonDriver;

impl OutputDriver for GeoJsonDriver {
    fn name(&self) -> &'static str {
        "GeoJSON"
    }

    fn remove_existing(&self, path: &Path, _layer_name: &str) -> Result<(), ExportError> {
        remove_if_exists(path)
    }

    fn create_layer(
        &self,
        path: &Path,
        layer_name: &str,
        srs: &ReferenceSystem,
    ) -> Result<Box<dyn LayerWriter>, ExportError> {
        let file = File::create(path).map_err(|err| ExportError::LayerCreationFailed {
            layer: layer_name.to_string(),
            reason: format!("{}: {err}", path.display()),
        })?;

        // RFC 7946 readers assume WGS84; anything else is named explicitly.
        let crs = (srs.epsg() != EPSG_WGS84).then(|| NamedCrs {
            kind: "name",
            properties: CrsName {
                name: format!("urn:ogc:def:crs:EPSG::{}", srs.epsg()),
            },
        });

        Ok(Box::new(GeoJsonLayer {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            name: layer_name.to_string(),
            crs,
            fields: Vec::new(),
            features: Vec::new(),
        }))
    }
}

struct GeoJsonLayer {
    path: PathBuf,
    out: BufWriter<File>,
    name: String,
    crs: Option<NamedCrs>,
    fields: Vec<FieldDefn>,
    features: Vec<PointFeature>,
}

#[derive(Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    crs: Option<&'a NamedCrs>,
    features: &'a [PointFeature],
}

#[derive(Serialize)]
struct NamedCrs {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: CrsName,
}

#[derive(Serialize)]
struct CrsName {
    name: String,
}

#[derive(Serialize)]
struct PointFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: Map<String, Value>,
    geometry: PointGeometry,
}

#[derive(Serialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

impl LayerWriter for GeoJsonLayer {
    fn create_field(&mut self, defn: &FieldDefn) -> Result<(), ExportError> {
        if self.fields.iter().any(|field| field.name == defn.name) {
            return Err(ExportError::FieldCreationFailed {
                field: defn.name.clone(),
                reason: "field already exists".to_string(),
            });
        }
        self.fields.push(defn.clone());
        Ok(())
    }

    fn write_feature(&mut self, feature: &Feature) -> Result<(), ExportError> {
        let properties = self
            .fields
            .iter()
            .map(|field| {
                let value = feature
                    .get(&field.name)
                    .map_or(Value::Null, |value| to_json(field.kind, value));
                (field.name.clone(), value)
            })
            .collect();

        self.features.push(PointFeature {
            kind: "Feature",
            properties,
            geometry: PointGeometry {
                kind: "Point",
                coordinates: [feature.x, feature.y],
            },
        });
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), ExportError> {
        let GeoJsonLayer {
            path,
            mut out,
            name,
            crs,
            features,
            ..
        } = *self;
        let failed = |reason: String| ExportError::WriteFailed {
            path: path.clone(),
            reason,
        };

        let collection = FeatureCollection {
            kind: "FeatureCollection",
            name: &name,
            crs: crs.as_ref(),
            features: &features,
        };
        serde_json::to_writer_pretty(&mut out, &collection).map_err(|err| failed(err.to_string()))?;
        out.write_all(b"\n").map_err(|err| failed(err.to_string()))?;
        out.flush().map_err(|err| failed(err.to_string()))
    }
}

fn to_json(kind: FieldKind, value: &FieldValue) -> Value {
    match (kind, value) {
        (FieldKind::Integer, FieldValue::Integer(number)) => Value::from(*number),
        (FieldKind::Text, FieldValue::Text(text)) => Value::from(text.as_str()),
        (_, value) => Value::from(value.as_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn read(path: &Path) -> Value {
        let raw = std::fs::read_to_string(path).expect("read output");
        serde_json::from_str(&raw).expect("valid json")
    }

    #[test]
    fn writes_feature_collection_with_typed_properties() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photos.geojson");
        let srs = ReferenceSystem::from_epsg(EPSG_WGS84).expect("wgs84");

        let mut layer = GeoJsonDriver
            .create_layer(&path, "photos", &srs)
            .expect("layer");
        layer
            .create_field(&FieldDefn::new("file", FieldKind::Text))
            .expect("file field");
        layer
            .create_field(&FieldDefn::new("rdate", FieldKind::Date))
            .expect("date field");
        layer
            .create_field(&FieldDefn::new("altitude", FieldKind::Integer))
            .expect("altitude field");
        assert!(layer
            .create_field(&FieldDefn::new("file", FieldKind::Text))
            .is_err());

        let mut feature = Feature::new(13.4, 52.5);
        feature.set("file", FieldValue::Text("a.jpg".to_string()));
        feature.set(
            "rdate",
            FieldValue::Date(NaiveDate::from_ymd_opt(2008, 5, 1).expect("date")),
        );
        feature.set("ignored", FieldValue::Integer(1));
        layer.write_feature(&feature).expect("write");
        layer.finish().expect("finish");

        let json = read(&path);
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["name"], "photos");
        assert!(json.get("crs").is_none());
        let feature = &json["features"][0];
        assert_eq!(feature["geometry"]["coordinates"][0], 13.4);
        assert_eq!(feature["geometry"]["coordinates"][1], 52.5);
        assert_eq!(feature["properties"]["file"], "a.jpg");
        assert_eq!(feature["properties"]["rdate"], "2008-05-01");
        assert!(feature["properties"]["altitude"].is_null());
        assert!(feature["properties"].get("ignored").is_none());
    }

    #[test]
    fn non_wgs84_output_names_its_crs() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("utm.geojson");
        let srs = ReferenceSystem::from_epsg(32633).expect("utm");

        let layer = GeoJsonDriver
            .create_layer(&path, "photos", &srs)
            .expect("layer");
        layer.finish().expect("finish");

        let json = read(&path);
        assert_eq!(
            json["crs"]["properties"]["name"],
            "urn:ogc:def:crs:EPSG::32633"
        );
        assert_eq!(json["features"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn unwritable_path_fails_layer_creation() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("missing-dir").join("photos.geojson");
        let srs = ReferenceSystem::from_epsg(EPSG_WGS84).expect("wgs84");
        let result = GeoJsonDriver.create_layer(&path, "photos", &srs);
        assert!(matches!(
            result,
            Err(ExportError::LayerCreationFailed { .. })
        ));
    }
}
