use crate::error::ExportError;
use crate::photo::EPSG_TOKYO;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

// Tokyo datum with the EPSG:1231 three-parameter shift to WGS84. Some
// definition tables ship EPSG:4301 without `+towgs84`, which would make the
// datum shift a no-op.
const TOKYO_PROJ4: &str =
    "+proj=longlat +ellps=bessel +towgs84=-146.414,507.337,680.507,0,0,0,0 +no_defs";

pub struct ReferenceSystem {
    epsg: u16,
    proj: Proj,
    geographic: bool,
    wkt: &'static str,
}

impl fmt::Debug for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceSystem")
            .field("epsg", &self.epsg)
            .field("geographic", &self.geographic)
            .finish()
    }
}

impl ReferenceSystem {
    pub fn from_epsg(epsg: u16) -> Result<Self, ExportError> {
        let invalid = |reason: String| ExportError::InvalidReferenceSystem {
            epsg: u32::from(epsg),
            reason,
        };

        let def = crs_definitions::from_code(epsg)
            .ok_or_else(|| invalid("unknown EPSG code".to_string()))?;
        let proj4 = if epsg == EPSG_TOKYO && !def.proj4.contains("+towgs84") {
            TOKYO_PROJ4
        } else {
            def.proj4
        };
        let proj = Proj::from_proj_string(proj4).map_err(|err| invalid(format!("{err:?}")))?;

        Ok(Self {
            epsg,
            proj,
            geographic: proj4.contains("+proj=longlat") || proj4.contains("+proj=latlong"),
            wkt: def.wkt,
        })
    }

    pub fn epsg(&self) -> u16 {
        self.epsg
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    pub fn wkt(&self) -> &'static str {
        self.wkt
    }

    /// Moves one point from `self` into `target`. Geographic coordinates are
    /// taken and returned in degrees as (longitude, latitude).
    pub fn transform_point(
        &self,
        target: &ReferenceSystem,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), String> {
        let mut point = if self.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.proj, &target.proj, &mut point).map_err(|err| format!("{err:?}"))?;

        let (x, y) = if target.geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if x.is_finite() && y.is_finite() {
            Ok((x, y))
        } else {
            Err("transformation produced a non-finite coordinate".to_string())
        }
    }
}

/// Reprojects photo coordinates into one output system, resolving each
/// source system once per run.
#[derive(Debug)]
pub struct Reprojector {
    target: ReferenceSystem,
    sources: HashMap<u16, ReferenceSystem>,
}

impl Reprojector {
    pub fn new(target: ReferenceSystem) -> Self {
        Self {
            target,
            sources: HashMap::new(),
        }
    }

    pub fn target(&self) -> &ReferenceSystem {
        &self.target
    }

    /// Returns `(x, y)` in the target system for a point given as
    /// longitude/latitude in `source_epsg`.
    pub fn project(
        &mut self,
        path: &Path,
        source_epsg: u16,
        longitude: f64,
        latitude: f64,
    ) -> Result<(f64, f64), ExportError> {
        if source_epsg == self.target.epsg {
            return Ok((longitude, latitude));
        }

        let target_epsg = self.target.epsg;
        let failed = |reason: String| ExportError::ReprojectionFailed {
            path: path.to_path_buf(),
            from: source_epsg,
            to: target_epsg,
            reason,
        };

        if !self.sources.contains_key(&source_epsg) {
            let source =
                ReferenceSystem::from_epsg(source_epsg).map_err(|err| failed(err.to_string()))?;
            self.sources.insert(source_epsg, source);
        }
        let source = self
            .sources
            .get(&source_epsg)
            .ok_or_else(|| failed("source system unavailable".to_string()))?;

        source
            .transform_point(&self.target, longitude, latitude)
            .map_err(failed)
    }
}
