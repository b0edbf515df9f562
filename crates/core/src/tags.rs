use crate::dms::Dms;
use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, Field, In, Tag, Value};
use num_bigint::BigInt;
use num_rational::BigRational;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GpsTag {
    Latitude,
    LatitudeRef,
    Longitude,
    LongitudeRef,
    Altitude,
    AltitudeRef,
    MapDatum,
    DateTime,
    DateTimeOriginal,
}

impl GpsTag {
    pub const ALL: [GpsTag; 9] = [
        GpsTag::Latitude,
        GpsTag::LatitudeRef,
        GpsTag::Longitude,
        GpsTag::LongitudeRef,
        GpsTag::Altitude,
        GpsTag::AltitudeRef,
        GpsTag::MapDatum,
        GpsTag::DateTime,
        GpsTag::DateTimeOriginal,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GpsTag::Latitude => "Exif.GPSInfo.GPSLatitude",
            GpsTag::LatitudeRef => "Exif.GPSInfo.GPSLatitudeRef",
            GpsTag::Longitude => "Exif.GPSInfo.GPSLongitude",
            GpsTag::LongitudeRef => "Exif.GPSInfo.GPSLongitudeRef",
            GpsTag::Altitude => "Exif.GPSInfo.GPSAltitude",
            GpsTag::AltitudeRef => "Exif.GPSInfo.GPSAltitudeRef",
            GpsTag::MapDatum => "Exif.GPSInfo.GPSMapDatum",
            GpsTag::DateTime => "Exif.Image.DateTime",
            GpsTag::DateTimeOriginal => "Exif.Photo.DateTimeOriginal",
        }
    }

    fn from_exif_tag(tag: Tag) -> Option<Self> {
        let tag = match tag {
            Tag::GPSLatitude => GpsTag::Latitude,
            Tag::GPSLatitudeRef => GpsTag::LatitudeRef,
            Tag::GPSLongitude => GpsTag::Longitude,
            Tag::GPSLongitudeRef => GpsTag::LongitudeRef,
            Tag::GPSAltitude => GpsTag::Altitude,
            Tag::GPSAltitudeRef => GpsTag::AltitudeRef,
            Tag::GPSMapDatum => GpsTag::MapDatum,
            Tag::DateTime => GpsTag::DateTime,
            Tag::DateTimeOriginal => GpsTag::DateTimeOriginal,
            _ => return None,
        };
        Some(tag)
    }
}

impl fmt::Display for GpsTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Dms(Dms),
    Text(String),
    Rational(BigRational),
    Byte(u8),
    DateTime(NaiveDateTime),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Dms(dms) => write!(
                f,
                "{} deg {} min {} sec",
                dms.degrees, dms.minutes, dms.seconds
            ),
            TagValue::Text(text) => f.write_str(text),
            TagValue::Rational(value) => write!(f, "{value}"),
            TagValue::Byte(value) => write!(f, "{value}"),
            TagValue::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// The subset of an image's EXIF tags needed for geolocation, keyed by tag.
/// Missing or malformed tags are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    values: BTreeMap<GpsTag, TagValue>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exif(exif: &Exif) -> Self {
        let mut tags = Self::new();
        for field in exif.fields().filter(|field| field.ifd_num == In::PRIMARY) {
            let Some(tag) = GpsTag::from_exif_tag(field.tag) else {
                continue;
            };
            if let Some(value) = convert_field(tag, field) {
                tags.insert(tag, value);
            }
        }
        tags
    }

    pub fn contains(&self, tag: GpsTag) -> bool {
        self.values.contains_key(&tag)
    }

    pub fn get(&self, tag: GpsTag) -> Option<&TagValue> {
        self.values.get(&tag)
    }

    pub fn insert(&mut self, tag: GpsTag, value: TagValue) -> Option<TagValue> {
        self.values.insert(tag, value)
    }

    pub fn remove(&mut self, tag: GpsTag) -> Option<TagValue> {
        self.values.remove(&tag)
    }

    pub fn with(mut self, tag: GpsTag, value: TagValue) -> Self {
        self.insert(tag, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (GpsTag, &TagValue)> {
        self.values.iter().map(|(tag, value)| (*tag, value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dms(&self, tag: GpsTag) -> Option<&Dms> {
        match self.get(tag)? {
            TagValue::Dms(dms) => Some(dms),
            _ => None,
        }
    }

    pub fn text(&self, tag: GpsTag) -> Option<&str> {
        match self.get(tag)? {
            TagValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn rational(&self, tag: GpsTag) -> Option<&BigRational> {
        match self.get(tag)? {
            TagValue::Rational(value) => Some(value),
            _ => None,
        }
    }

    pub fn byte(&self, tag: GpsTag) -> Option<u8> {
        match self.get(tag)? {
            TagValue::Byte(value) => Some(*value),
            _ => None,
        }
    }

    pub fn date_time(&self, tag: GpsTag) -> Option<NaiveDateTime> {
        match self.get(tag)? {
            TagValue::DateTime(value) => Some(*value),
            _ => None,
        }
    }
}

fn convert_field(tag: GpsTag, field: &Field) -> Option<TagValue> {
    match tag {
        GpsTag::Latitude | GpsTag::Longitude => match &field.value {
            Value::Rational(values) => Dms::from_exif(values).map(TagValue::Dms),
            _ => None,
        },
        GpsTag::LatitudeRef | GpsTag::LongitudeRef | GpsTag::MapDatum => {
            ascii_text(&field.value).map(TagValue::Text)
        }
        GpsTag::Altitude => match &field.value {
            Value::Rational(values) => values
                .first()
                .filter(|value| value.denom != 0)
                .map(|value| {
                    TagValue::Rational(BigRational::new(
                        BigInt::from(value.num),
                        BigInt::from(value.denom),
                    ))
                }),
            _ => None,
        },
        GpsTag::AltitudeRef => match &field.value {
            Value::Byte(values) => values.first().copied().map(TagValue::Byte),
            _ => None,
        },
        GpsTag::DateTime | GpsTag::DateTimeOriginal => match &field.value {
            Value::Ascii(values) => values
                .first()
                .and_then(|raw| parse_exif_datetime(raw))
                .map(TagValue::DateTime),
            _ => None,
        },
    }
}

fn ascii_text(value: &Value) -> Option<String> {
    let Value::Ascii(values) = value else {
        return None;
    };
    let raw = values.first()?;
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let parsed = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(
        i32::from(parsed.year),
        u32::from(parsed.month),
        u32::from(parsed.day),
    )?
    .and_hms_opt(
        u32::from(parsed.hour),
        u32::from(parsed.minute),
        u32::from(parsed.second),
    )
}
