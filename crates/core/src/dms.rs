use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive};

const SECONDS_DENOMINATOR: u32 = 10_000;

/// Angle split into degrees, minutes and seconds, each kept as an exact rational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dms {
    pub degrees: BigRational,
    pub minutes: BigRational,
    pub seconds: BigRational,
}

impl Dms {
    pub fn new(degrees: BigRational, minutes: BigRational, seconds: BigRational) -> Self {
        Self {
            degrees,
            minutes,
            seconds,
        }
    }

    pub fn from_integers(degrees: i64, minutes: i64, seconds: i64) -> Self {
        Self::new(
            BigRational::from_integer(degrees.into()),
            BigRational::from_integer(minutes.into()),
            BigRational::from_integer(seconds.into()),
        )
    }

    /// Reads the three unsigned rationals EXIF stores for a GPS coordinate.
    /// Anything other than exactly three values with non-zero denominators is
    /// treated as absent.
    pub fn from_exif(values: &[exif::Rational]) -> Option<Self> {
        let [degrees, minutes, seconds] = values else {
            return None;
        };
        Some(Self::new(
            exif_to_ratio(degrees)?,
            exif_to_ratio(minutes)?,
            exif_to_ratio(seconds)?,
        ))
    }

    /// Encodes the triplet as EXIF rationals. Integer components keep a
    /// denominator of one, fractional ones are rounded to 1/10000. Seconds
    /// that round up to a full minute carry into the minutes, and so on.
    /// Negative components cannot be stored and yield `None`.
    pub fn to_exif_rationals(&self) -> Option<[exif::Rational; 3]> {
        let sixty = BigRational::from_integer(BigInt::from(60));
        let mut degrees = round_to_exif_precision(&self.degrees);
        let mut minutes = round_to_exif_precision(&self.minutes);
        let mut seconds = round_to_exif_precision(&self.seconds);

        if seconds >= sixty && minutes.is_integer() {
            seconds -= &sixty;
            minutes += BigRational::one();
        }
        if minutes >= sixty && degrees.is_integer() {
            minutes -= &sixty;
            degrees += BigRational::one();
        }

        Some([
            ratio_to_exif(&degrees)?,
            ratio_to_exif(&minutes)?,
            ratio_to_exif(&seconds)?,
        ])
    }

    pub fn to_decimal_degrees(&self) -> f64 {
        to_decimal_degrees(&self.degrees, &self.minutes, &self.seconds)
    }
}

pub fn to_decimal_degrees(
    degrees: &BigRational,
    minutes: &BigRational,
    seconds: &BigRational,
) -> f64 {
    let sixty = BigRational::from_integer(BigInt::from(60));
    let thirty_six_hundred = BigRational::from_integer(BigInt::from(3600));
    let total = degrees + minutes / sixty + seconds / thirty_six_hundred;
    total.to_f64().unwrap_or(f64::NAN)
}

/// Splits a decimal angle into truncated degrees, truncated minutes and exact
/// seconds. Truncation is toward zero, so a negative input produces
/// non-positive components whose plain sum is still the input.
pub fn from_decimal_degrees(value: f64) -> Option<Dms> {
    let exact = BigRational::from_float(value)?;
    let sixty = BigRational::from_integer(BigInt::from(60));

    let degrees = exact.trunc();
    let total_minutes = (exact - &degrees) * &sixty;
    let minutes = total_minutes.trunc();
    let seconds = (total_minutes - &minutes) * sixty;

    Some(Dms::new(degrees, minutes, seconds))
}

fn exif_to_ratio(value: &exif::Rational) -> Option<BigRational> {
    if value.denom == 0 {
        return None;
    }
    Some(BigRational::new(
        BigInt::from(value.num),
        BigInt::from(value.denom),
    ))
}

fn round_to_exif_precision(value: &BigRational) -> BigRational {
    if value.is_integer() {
        return value.clone();
    }
    let denom = BigRational::from_integer(BigInt::from(SECONDS_DENOMINATOR));
    (value * &denom).round() / denom
}

fn ratio_to_exif(value: &BigRational) -> Option<exif::Rational> {
    if value.is_negative() {
        return None;
    }
    if value.is_integer() {
        let num = value.to_integer().to_u32()?;
        return Some(exif::Rational { num, denom: 1 });
    }

    let scaled = value * BigRational::from_integer(BigInt::from(SECONDS_DENOMINATOR));
    Some(exif::Rational {
        num: scaled.to_integer().to_u32()?,
        denom: SECONDS_DENOMINATOR,
    })
}
