use crate::config::DEFAULT_LAYER_NAME;
use crate::crs::{ReferenceSystem, Reprojector};
use crate::error::ExportError;
use crate::output::{driver_by_name, Feature, FieldDefn, FieldKind, FieldValue};
use crate::photo::{GeoPhoto, EPSG_WGS84};
use crate::walker::MediaWalker;
use rayon::prelude::*;
use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const JPEG_MEDIA_TYPE: &str = "image/jpeg";
const STRING_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const STRING_TIME_FORMAT: &str = "%H:%M:%S";

pub const FIELD_FILE: &str = "file";
pub const FIELD_DATETIME: &str = "rdatetime";
pub const FIELD_DATE: &str = "rdate";
pub const FIELD_TIME: &str = "rtime";
pub const FIELD_ALTITUDE: &str = "altitude";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub inputs: Vec<PathBuf>,
    pub absolute_paths: bool,
    pub recursive: bool,
    pub follow_links: bool,
    pub combined_datetime: bool,
    pub string_temporal: bool,
    pub layer_name: String,
    pub format: String,
    pub output: PathBuf,
    pub target_epsg: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            absolute_paths: false,
            recursive: false,
            follow_links: false,
            combined_datetime: false,
            string_temporal: false,
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            format: String::new(),
            output: PathBuf::new(),
            target_epsg: u32::from(EPSG_WGS84),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOptions {
    pub recursive: bool,
    pub follow_links: bool,
    pub absolute_paths: bool,
}

impl From<&ExportOptions> for DiscoveryOptions {
    fn from(options: &ExportOptions) -> Self {
        Self {
            recursive: options.recursive,
            follow_links: options.follow_links,
            absolute_paths: options.absolute_paths,
        }
    }
}

/// Every JPEG found under the inputs, in discovery order.
#[derive(Debug, Default)]
pub struct Collected {
    pub jpeg_files: usize,
    pub invalid: usize,
    pub photos: Vec<GeoPhoto>,
}

impl Collected {
    pub fn geolocated(&self) -> impl Iterator<Item = &GeoPhoto> {
        self.photos.iter().filter(|photo| photo.has_full_geo_info())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub photos_found: usize,
    pub geolocated: usize,
    pub invalid: usize,
    pub written: usize,
    pub skipped: usize,
    pub missing_fields: Vec<String>,
    pub output: PathBuf,
    pub target_epsg: u32,
}

pub fn collect_photos(inputs: &[PathBuf], options: DiscoveryOptions) -> Collected {
    let found = Rc::new(RefCell::new(Vec::<PathBuf>::new()));

    for input in inputs {
        if !input.exists() {
            log::warn!("\"{}\" does not exist. skipping.", input.display());
            continue;
        }

        let sink = Rc::clone(&found);
        let absolute = options.absolute_paths;
        let mut walker =
            MediaWalker::new(input, options.recursive).follow_links(options.follow_links);
        walker.register(
            JPEG_MEDIA_TYPE,
            Rc::new(move |path: &Path| sink.borrow_mut().push(display_path(path, absolute))),
        );
        match walker.start() {
            Ok(stats) => log::debug!(
                "{}: {} files, {} jpeg",
                input.display(),
                stats.files_seen,
                stats.matched
            ),
            Err(err) => log::warn!("could not walk {}: {err}", input.display()),
        }
    }

    let paths = found.take();
    let jpeg_files = paths.len();
    let results: Vec<_> = paths.par_iter().map(GeoPhoto::open).collect();

    let mut collected = Collected {
        jpeg_files,
        ..Collected::default()
    };
    for result in results {
        match result {
            Ok(photo) => collected.photos.push(photo),
            Err(err) => {
                log::warn!("{err}. skipping.");
                collected.invalid += 1;
            }
        }
    }
    collected
}

pub fn run_export(options: &ExportOptions) -> Result<ExportSummary, ExportError> {
    let driver = driver_by_name(&options.format)?;

    let collected = collect_photos(&options.inputs, options.into());
    if collected.jpeg_files == 0 {
        return Err(ExportError::NoInputFound);
    }
    let photos: Vec<&GeoPhoto> = collected.geolocated().collect();
    if photos.is_empty() {
        return Err(ExportError::NoGeolocatedInput {
            found: collected.jpeg_files,
        });
    }
    log::debug!(
        "found {} jpeg files, {} with GPS information.",
        collected.jpeg_files,
        photos.len()
    );

    let epsg = u16::try_from(options.target_epsg).map_err(|_| {
        ExportError::InvalidReferenceSystem {
            epsg: options.target_epsg,
            reason: "EPSG codes above 65535 are not supported".to_string(),
        }
    })?;
    let target = ReferenceSystem::from_epsg(epsg)?;

    driver.remove_existing(&options.output, &options.layer_name)?;
    let mut layer = driver.create_layer(&options.output, &options.layer_name, &target)?;

    let mut summary = ExportSummary {
        photos_found: collected.jpeg_files,
        geolocated: photos.len(),
        invalid: collected.invalid,
        output: options.output.clone(),
        target_epsg: options.target_epsg,
        ..ExportSummary::default()
    };

    for defn in layer_schema(options) {
        if let Err(err) = layer.create_field(&defn) {
            log::warn!("{err}. ignoring.");
            summary.missing_fields.push(defn.name);
        }
    }

    let mut reprojector = Reprojector::new(target);
    for photo in photos {
        match build_feature(photo, options, &mut reprojector) {
            Ok(feature) => {
                layer.write_feature(&feature)?;
                summary.written += 1;
            }
            Err(err) => {
                log::warn!("{err}. skipping feature.");
                summary.skipped += 1;
            }
        }
    }

    layer.finish()?;
    Ok(summary)
}

pub fn layer_schema(options: &ExportOptions) -> Vec<FieldDefn> {
    let temporal = |native: FieldKind| {
        if options.string_temporal {
            FieldKind::Text
        } else {
            native
        }
    };

    let mut fields = vec![FieldDefn::new(FIELD_FILE, FieldKind::Text)];
    if options.combined_datetime {
        fields.push(FieldDefn::new(FIELD_DATETIME, temporal(FieldKind::DateTime)));
    } else {
        fields.push(FieldDefn::new(FIELD_DATE, FieldKind::Date));
        fields.push(FieldDefn::new(FIELD_TIME, temporal(FieldKind::Time)));
    }
    fields.push(FieldDefn::new(FIELD_ALTITUDE, FieldKind::Integer));
    fields
}

fn build_feature(
    photo: &GeoPhoto,
    options: &ExportOptions,
    reprojector: &mut Reprojector,
) -> Result<Feature, ExportError> {
    let (Some(longitude), Some(latitude)) = (photo.longitude(), photo.latitude()) else {
        return Err(ExportError::ReprojectionFailed {
            path: photo.path().to_path_buf(),
            from: photo.reference_system_id(),
            to: reprojector.target().epsg(),
            reason: "coordinates could not be decoded".to_string(),
        });
    };
    let (x, y) = reprojector.project(
        photo.path(),
        photo.reference_system_id(),
        longitude,
        latitude,
    )?;

    let mut feature = Feature::new(x, y);
    feature.set(
        FIELD_FILE,
        FieldValue::Text(photo.path().to_string_lossy().into_owned()),
    );

    if let Some(stamp) = photo.recording_date() {
        if options.combined_datetime {
            let value = if options.string_temporal {
                FieldValue::Text(stamp.format(STRING_DATETIME_FORMAT).to_string())
            } else {
                FieldValue::DateTime(stamp)
            };
            feature.set(FIELD_DATETIME, value);
        } else {
            feature.set(FIELD_DATE, FieldValue::Date(stamp.date()));
            let value = if options.string_temporal {
                FieldValue::Text(stamp.format(STRING_TIME_FORMAT).to_string())
            } else {
                FieldValue::Time(stamp.time())
            };
            feature.set(FIELD_TIME, value);
        }
    }

    if let Some(altitude) = photo.altitude() {
        feature.set(FIELD_ALTITUDE, FieldValue::Integer(altitude.round() as i64));
    }

    Ok(feature)
}

fn display_path(path: &Path, absolute: bool) -> PathBuf {
    if !absolute {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|err| {
        log::warn!("could not make {} absolute: {err}", path.display());
        path.to_path_buf()
    })
}
