use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use std::io::Cursor;
use std::path::Path;

/// Builds the smallest JPEG kamadak-exif will accept: SOI, one APP1 Exif
/// segment, EOI.
#[derive(Default)]
pub struct JpegFixture {
    fields: Vec<Field>,
}

impl JpegFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latitude(self, dms: [(u32, u32); 3], reference: &str) -> Self {
        self.rationals(Tag::GPSLatitude, dms)
            .ascii(Tag::GPSLatitudeRef, reference)
    }

    pub fn longitude(self, dms: [(u32, u32); 3], reference: &str) -> Self {
        self.rationals(Tag::GPSLongitude, dms)
            .ascii(Tag::GPSLongitudeRef, reference)
    }

    pub fn altitude(mut self, (num, denom): (u32, u32), below_sea_level: bool) -> Self {
        self.push(Tag::GPSAltitude, Value::Rational(vec![Rational { num, denom }]));
        self.push(
            Tag::GPSAltitudeRef,
            Value::Byte(vec![u8::from(below_sea_level)]),
        );
        self
    }

    pub fn map_datum(self, datum: &str) -> Self {
        self.ascii(Tag::GPSMapDatum, datum)
    }

    pub fn date_time(self, stamp: &str) -> Self {
        self.ascii(Tag::DateTime, stamp)
    }

    pub fn date_time_original(self, stamp: &str) -> Self {
        self.ascii(Tag::DateTimeOriginal, stamp)
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        for field in &self.fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).expect("encode exif");
        let tiff = tiff.into_inner();

        let segment_len = u16::try_from(tiff.len() + 8).expect("exif segment fits");
        let mut jpeg = vec![0xff, 0xd8, 0xff, 0xe1];
        jpeg.extend_from_slice(&segment_len.to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xff, 0xd9]);
        jpeg
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.bytes()).expect("write jpeg fixture");
    }

    fn rationals(mut self, tag: Tag, values: [(u32, u32); 3]) -> Self {
        let values = values
            .iter()
            .map(|(num, denom)| Rational {
                num: *num,
                denom: *denom,
            })
            .collect();
        self.push(tag, Value::Rational(values));
        self
    }

    fn ascii(mut self, tag: Tag, text: &str) -> Self {
        self.push(tag, Value::Ascii(vec![text.as_bytes().to_vec()]));
        self
    }

    fn push(&mut self, tag: Tag, value: Value) {
        self.fields.push(Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        });
    }
}

pub fn berlin() -> JpegFixture {
    JpegFixture::new()
        .latitude([(52, 1), (30, 1), (0, 1)], "N")
        .longitude([(13, 1), (24, 1), (0, 1)], "E")
        .altitude((34, 1), false)
        .date_time_original("2008:05:01 12:30:45")
}

pub fn cape_town() -> JpegFixture {
    JpegFixture::new()
        .latitude([(33, 1), (54, 1), (0, 1)], "S")
        .longitude([(18, 1), (24, 1), (0, 1)], "E")
        .date_time("2008:06:02 08:15:00")
}

pub fn without_gps() -> JpegFixture {
    JpegFixture::new().date_time("2008:07:03 18:00:00")
}
