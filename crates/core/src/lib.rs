mod config;
mod crs;
mod dms;
mod error;
mod export;
mod output;
mod photo;
mod tags;
mod walker;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
    DEFAULT_LAYER_NAME,
};
pub use crs::{ReferenceSystem, Reprojector};
pub use dms::{from_decimal_degrees, to_decimal_degrees, Dms};
pub use error::{ExportError, PhotoError};
pub use export::{
    collect_photos, layer_schema, run_export, Collected, DiscoveryOptions, ExportOptions,
    ExportSummary,
};
pub use output::{
    available_drivers, driver_by_name, Feature, FieldDefn, FieldKind, FieldValue, LayerWriter,
    OutputDriver,
};
pub use photo::{GeoPhoto, PhotoSummary, EPSG_TOKYO, EPSG_WGS84};
pub use tags::{GpsTag, TagSet, TagValue};
pub use walker::{media_type_for, Callback, MediaWalker, WalkStats};
