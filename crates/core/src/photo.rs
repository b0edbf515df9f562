use crate::dms::{from_decimal_degrees, Dms};
use crate::error::PhotoError;
use crate::tags::{GpsTag, TagSet, TagValue};
use chrono::NaiveDateTime;
use exif::Reader;
use num_traits::ToPrimitive;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

// EXIF 2.2 allows exactly two geodetic datums for GPS data.
pub const EPSG_WGS84: u16 = 4326;
pub const EPSG_TOKYO: u16 = 4301;

const TOKYO_DATUM: &str = "TOKYO";
const REQUIRED_TAGS: [GpsTag; 4] = [
    GpsTag::Latitude,
    GpsTag::LatitudeRef,
    GpsTag::Longitude,
    GpsTag::LongitudeRef,
];

/// One JPEG and the geolocation facts read from its EXIF block.
#[derive(Debug, Clone)]
pub struct GeoPhoto {
    path: PathBuf,
    tags: TagSet,
}

impl GeoPhoto {
    /// Reads the EXIF block of `path`. A JPEG without any EXIF data is a
    /// valid photo with no tags; anything that cannot be parsed as an image
    /// container is `InvalidImage`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PhotoError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| PhotoError::invalid_image(path, err))?;
        let mut buf = BufReader::new(file);

        let tags = match Reader::new().read_from_container(&mut buf) {
            Ok(exif) => TagSet::from_exif(&exif),
            Err(exif::Error::NotFound(_)) => {
                log::debug!("no EXIF data in {}", path.display());
                TagSet::new()
            }
            Err(err) => return Err(PhotoError::invalid_image(path, err)),
        };

        Ok(Self::from_tags(path, tags))
    }

    pub fn from_tags(path: impl Into<PathBuf>, tags: TagSet) -> Self {
        Self {
            path: path.into(),
            tags,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn has_full_geo_info(&self) -> bool {
        REQUIRED_TAGS.iter().all(|tag| self.tags.contains(*tag))
    }

    pub fn latitude(&self) -> Option<f64> {
        self.signed_coordinate(GpsTag::Latitude, GpsTag::LatitudeRef, "S")
    }

    pub fn longitude(&self) -> Option<f64> {
        self.signed_coordinate(GpsTag::Longitude, GpsTag::LongitudeRef, "W")
    }

    /// Altitude in meters, negative when the reference byte marks it as below
    /// sea level.
    pub fn altitude(&self) -> Option<f64> {
        let meters = self.tags.rational(GpsTag::Altitude)?.to_f64()?;
        if self.tags.byte(GpsTag::AltitudeRef) == Some(1) {
            Some(-meters)
        } else {
            Some(meters)
        }
    }

    pub fn recording_date(&self) -> Option<NaiveDateTime> {
        self.tags
            .date_time(GpsTag::DateTimeOriginal)
            .or_else(|| self.tags.date_time(GpsTag::DateTime))
    }

    pub fn reference_system_id(&self) -> u16 {
        match self.tags.text(GpsTag::MapDatum) {
            Some(TOKYO_DATUM) => EPSG_TOKYO,
            _ => EPSG_WGS84,
        }
    }

    pub fn as_wkt(&self) -> Option<String> {
        let longitude = self.longitude()?;
        let latitude = self.latitude()?;
        Some(format!("POINT({longitude:.8} {latitude:.8})"))
    }

    /// Stores `latitude` in the in-memory tag set; the file is not touched.
    pub fn set_latitude(&mut self, latitude: f64) -> bool {
        let hemisphere = if latitude < 0.0 { "S" } else { "N" };
        self.set_coordinate(GpsTag::Latitude, GpsTag::LatitudeRef, latitude, hemisphere)
    }

    pub fn set_longitude(&mut self, longitude: f64) -> bool {
        let hemisphere = if longitude < 0.0 { "W" } else { "E" };
        self.set_coordinate(
            GpsTag::Longitude,
            GpsTag::LongitudeRef,
            longitude,
            hemisphere,
        )
    }

    pub fn summary(&self) -> PhotoSummary {
        PhotoSummary {
            path: self.path.clone(),
            has_full_geo_info: self.has_full_geo_info(),
            latitude: self.latitude(),
            longitude: self.longitude(),
            altitude: self.altitude(),
            recording_date: self.recording_date(),
            epsg: self.reference_system_id(),
            tags: self
                .tags
                .iter()
                .map(|(tag, value)| (tag.key().to_string(), value.to_string()))
                .collect(),
        }
    }

    fn signed_coordinate(&self, value: GpsTag, reference: GpsTag, negative: &str) -> Option<f64> {
        let magnitude = self.tags.dms(value)?.to_decimal_degrees().abs();
        let reference = self.tags.text(reference)?;
        if reference == negative {
            Some(-magnitude)
        } else {
            Some(magnitude)
        }
    }

    fn set_coordinate(
        &mut self,
        value: GpsTag,
        reference: GpsTag,
        coordinate: f64,
        hemisphere: &str,
    ) -> bool {
        // Keep only what an EXIF rational triplet can hold.
        let Some(dms) = from_decimal_degrees(coordinate.abs())
            .and_then(|dms| dms.to_exif_rationals())
            .and_then(|rationals| Dms::from_exif(&rationals))
        else {
            return false;
        };
        self.tags.insert(value, TagValue::Dms(dms));
        self.tags
            .insert(reference, TagValue::Text(hemisphere.to_string()));
        true
    }
}

/// Flat view of a photo's geolocation facts for reports.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoSummary {
    pub path: PathBuf,
    pub has_full_geo_info: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub recording_date: Option<NaiveDateTime>,
    pub epsg: u16,
    pub tags: Vec<(String, String)>,
}
