use super::{remove_if_exists, Feature, FieldDefn, FieldKind, FieldValue, LayerWriter, OutputDriver};
use crate::crs::ReferenceSystem;
use crate::error::ExportError;
use chrono::Datelike;
use shapefile::dbase::{self, FieldName, Record, TableWriterBuilder};
use shapefile::{Point, Writer};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const SIDECAR_EXTENSIONS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];
const TEXT_FIELD_LEN: u8 = 254;
const INTEGER_FIELD_LEN: u8 = 10;

/// Writes `<output>.shp` when the output names a `.shp` file, otherwise
/// `<output>/<layer>.shp`.
pub struct ShapefileDriver;

impl ShapefileDriver {
    fn shp_path(path: &Path, layer_name: &str) -> PathBuf {
        let is_shp = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);
        if is_shp {
            path.to_path_buf()
        } else {
            path.join(format!("{layer_name}.shp"))
        }
    }
}

impl OutputDriver for ShapefileDriver {
    fn name(&self) -> &'static str {
        "ESRI Shapefile"
    }

    fn remove_existing(&self, path: &Path, layer_name: &str) -> Result<(), ExportError> {
        let shp = Self::shp_path(path, layer_name);
        for ext in SIDECAR_EXTENSIONS {
            remove_if_exists(&shp.with_extension(ext))?;
        }
        Ok(())
    }

    fn create_layer(
        &self,
        path: &Path,
        layer_name: &str,
        srs: &ReferenceSystem,
    ) -> Result<Box<dyn LayerWriter>, ExportError> {
        let failed = |reason: String| ExportError::LayerCreationFailed {
            layer: layer_name.to_string(),
            reason,
        };

        let shp = Self::shp_path(path, layer_name);
        if let Some(parent) = shp.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| failed(format!("{}: {err}", parent.display())))?;
        }
        let prj = shp.with_extension("prj");
        fs::write(&prj, srs.wkt()).map_err(|err| failed(format!("{}: {err}", prj.display())))?;

        Ok(Box::new(ShapefileLayer {
            shp,
            fields: Vec::new(),
            writer: None,
        }))
    }
}

struct ShapefileLayer {
    shp: PathBuf,
    fields: Vec<FieldDefn>,
    writer: Option<Writer<BufWriter<File>>>,
}

impl ShapefileLayer {
    fn write_failed(&self, reason: String) -> ExportError {
        ExportError::WriteFailed {
            path: self.shp.clone(),
            reason,
        }
    }

    fn open_writer(&mut self) -> Result<&mut Writer<BufWriter<File>>, ExportError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.create_writer()?,
        };
        Ok(self.writer.insert(writer))
    }

    fn create_writer(&self) -> Result<Writer<BufWriter<File>>, ExportError> {
        let mut table = TableWriterBuilder::new();
        for defn in &self.fields {
            let name = FieldName::try_from(defn.name.as_str())
                .map_err(|err| self.write_failed(format!("{}: {err:?}", defn.name)))?;
            table = match defn.kind {
                FieldKind::Text => table.add_character_field(name, TEXT_FIELD_LEN),
                FieldKind::Integer => table.add_numeric_field(name, INTEGER_FIELD_LEN, 0),
                FieldKind::Date => table.add_date_field(name),
                FieldKind::Time | FieldKind::DateTime => table,
            };
        }
        Writer::from_path(&self.shp, table).map_err(|err| self.write_failed(err.to_string()))
    }
}

impl LayerWriter for ShapefileLayer {
    fn create_field(&mut self, defn: &FieldDefn) -> Result<(), ExportError> {
        let failed = |reason: &str| ExportError::FieldCreationFailed {
            field: defn.name.clone(),
            reason: reason.to_string(),
        };

        if self.writer.is_some() {
            return Err(failed("the table layout is fixed once features are written"));
        }
        if matches!(defn.kind, FieldKind::Time | FieldKind::DateTime) {
            return Err(failed(
                "shapefiles have no time or datetime field type; store it as text instead",
            ));
        }
        if self.fields.iter().any(|field| field.name == defn.name) {
            return Err(failed("field already exists"));
        }
        if let Err(err) = FieldName::try_from(defn.name.as_str()) {
            return Err(failed(&format!("invalid dBase field name: {err:?}")));
        }

        self.fields.push(defn.clone());
        Ok(())
    }

    fn write_feature(&mut self, feature: &Feature) -> Result<(), ExportError> {
        let mut record = Record::default();
        for defn in &self.fields {
            let value = feature.get(&defn.name);
            record.insert(defn.name.clone(), to_dbase(defn, value));
        }

        let point = Point::new(feature.x, feature.y);
        let shp = self.shp.clone();
        self.open_writer()?
            .write_shape_and_record(&point, &record)
            .map_err(|err| ExportError::WriteFailed {
                path: shp,
                reason: err.to_string(),
            })
    }

    fn finish(mut self: Box<Self>) -> Result<(), ExportError> {
        self.open_writer()?;
        // Headers and the .shx index are completed when the writer drops.
        drop(self.writer.take());
        Ok(())
    }
}

fn to_dbase(defn: &FieldDefn, value: Option<&FieldValue>) -> dbase::FieldValue {
    match defn.kind {
        FieldKind::Integer => dbase::FieldValue::Numeric(match value {
            Some(FieldValue::Integer(number)) => Some(*number as f64),
            _ => None,
        }),
        FieldKind::Date => dbase::FieldValue::Date(match value {
            Some(FieldValue::Date(date)) => Some(dbase::Date::new(
                date.day(),
                date.month(),
                date.year().max(0) as u32,
            )),
            Some(FieldValue::DateTime(stamp)) => Some(dbase::Date::new(
                stamp.day(),
                stamp.month(),
                stamp.year().max(0) as u32,
            )),
            _ => None,
        }),
        FieldKind::Text | FieldKind::Time | FieldKind::DateTime => {
            dbase::FieldValue::Character(
                value.map(|value| fit_character_field(&defn.name, value.as_text())),
            )
        }
    }
}

/// Cuts `text` to the dBase character width on a UTF-8 boundary.
fn fit_character_field(name: &str, mut text: String) -> String {
    let limit = usize::from(TEXT_FIELD_LEN);
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    log::warn!(
        "value of field {name} is {} bytes, truncated to {end}: {text}",
        text.len()
    );
    text.truncate(end);
    text
}
