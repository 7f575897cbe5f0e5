use crate::error::{GridError, Result};
use json::JsonValue;
use std::fmt;
use std::fs::read_to_string;
use std::str::FromStr;

/// How the load is applied to the loaded face
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    /// prescribed displacement on the loaded face
    Dirichlet,
    /// prescribed traction; no displacement constraint on the loaded face
    Neumann,
    Contact,
}

/// Selects a body specific refinement strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefineSpecial {
    Standard,
    CoarseAndFineBrick,
    Innermost,
    RodUniform,
    Simo,
    Uniform,
    None,
    RodUpsettingTapered,
    RodAxRatio,
    TrackedCorner,
}

impl FromStr for Driver {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Dirichlet" => Ok(Self::Dirichlet),
            "Neumann" => Ok(Self::Neumann),
            "Contact" => Ok(Self::Contact),
            other => Err(GridError::InvalidParameter(format!(
                "unknown loading driver '{}'",
                other
            ))),
        }
    }
}

impl FromStr for RefineSpecial {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Standard" => Self::Standard,
            "CoarseAndFineBrick" => Self::CoarseAndFineBrick,
            "Innermost" => Self::Innermost,
            "RodUniform" => Self::RodUniform,
            "Simo" => Self::Simo,
            "Uniform" => Self::Uniform,
            "None" => Self::None,
            "RodUpsettingTapered" => Self::RodUpsettingTapered,
            "RodAxRatio" => Self::RodAxRatio,
            "TrackedCorner" => Self::TrackedCorner,
            other => {
                return Err(GridError::InvalidParameter(format!(
                    "unknown refinement strategy '{}'",
                    other
                )))
            }
        })
    }
}

impl fmt::Display for RefineSpecial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Simulation parameters shared by all bodies.
///
/// Each body reads the subset it needs:
/// * HyperRectangle: `width`, `height`, `thickness`, `notch_width`, `ratio_x` (remaining width at the notch root)
/// * QuarterPlate: `width` (plate half width), `hole_radius`, `thickness`, `ratio_x` (hole block fraction)
/// * Rod: `width` (rod length), `hole_radius` (rod radius), `notch_width`, `ratio_x` (notch radius over rod radius)
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub width: f64,
    pub height: f64,
    pub thickness: f64,
    pub hole_radius: f64,
    pub notch_width: f64,
    pub ratio_x: f64,
    pub global_refinements: usize,
    pub hole_edge_refinements: usize,
    pub elements_in_z: usize,
    pub grid_y_repetitions: usize,
    /// refine the coarse grid only once; the remaining global refinements are left to the caller
    pub stepwise_global_refinement: bool,
    pub refine_special: RefineSpecial,
    pub driver: Driver,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 20.0,
            thickness: 1.0,
            hole_radius: 1.0,
            notch_width: 1.0,
            ratio_x: 0.8,
            global_refinements: 1,
            hole_edge_refinements: 1,
            elements_in_z: 1,
            grid_y_repetitions: 1,
            stepwise_global_refinement: false,
            refine_special: RefineSpecial::Standard,
            driver: Driver::Dirichlet,
        }
    }
}

const KNOWN_KEYS: [&str; 13] = [
    "width",
    "height",
    "thickness",
    "hole_radius",
    "notch_width",
    "ratio_x",
    "global_refinements",
    "hole_edge_refinements",
    "elements_in_z",
    "grid_y_repetitions",
    "stepwise_global_refinement",
    "refine_special",
    "driver",
];

impl Parameters {
    /// Load Parameters from a JSON file.
    ///
    /// Keys that are left out keep their default value:
    /// ```json
    /// {
    ///     "width": 2.0,
    ///     "height": 10.0,
    ///     "ratio_x": 0.75,
    ///     "global_refinements": 2,
    ///     "refine_special": "CoarseAndFineBrick",
    ///     "driver": "Neumann"
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<str>) -> Result<Self> {
        let contents = read_to_string(path.as_ref())?;
        let params_json = json::parse(&contents)?;
        Self::from_json(&params_json)
    }

    pub fn from_json(params_json: &JsonValue) -> Result<Self> {
        if !params_json.is_object() {
            return Err(GridError::InvalidParameter(
                "parameters must be a JSON object".to_string(),
            ));
        }
        if let Some((key, _)) = params_json
            .entries()
            .find(|(key, _)| !KNOWN_KEYS.contains(key))
        {
            return Err(GridError::InvalidParameter(format!("unknown key '{}'", key)));
        }

        let defaults = Self::default();
        let params = Self {
            width: read_f64(params_json, "width", defaults.width)?,
            height: read_f64(params_json, "height", defaults.height)?,
            thickness: read_f64(params_json, "thickness", defaults.thickness)?,
            hole_radius: read_f64(params_json, "hole_radius", defaults.hole_radius)?,
            notch_width: read_f64(params_json, "notch_width", defaults.notch_width)?,
            ratio_x: read_f64(params_json, "ratio_x", defaults.ratio_x)?,
            global_refinements: read_usize(
                params_json,
                "global_refinements",
                defaults.global_refinements,
            )?,
            hole_edge_refinements: read_usize(
                params_json,
                "hole_edge_refinements",
                defaults.hole_edge_refinements,
            )?,
            elements_in_z: read_usize(params_json, "elements_in_z", defaults.elements_in_z)?,
            grid_y_repetitions: read_usize(
                params_json,
                "grid_y_repetitions",
                defaults.grid_y_repetitions,
            )?,
            stepwise_global_refinement: match &params_json["stepwise_global_refinement"] {
                JsonValue::Null => defaults.stepwise_global_refinement,
                value => value.as_bool().ok_or_else(|| {
                    GridError::InvalidParameter(
                        "'stepwise_global_refinement' must be a boolean".to_string(),
                    )
                })?,
            },
            refine_special: match read_str(params_json, "refine_special")? {
                Some(s) => s.parse()?,
                None => defaults.refine_special,
            },
            driver: match read_str(params_json, "driver")? {
                Some(s) => s.parse()?,
                None => defaults.driver,
            },
        };

        params.validate()?;
        Ok(params)
    }

    /// Check that every length is positive and every ratio lies in `(0, 1]`
    pub fn validate(&self) -> Result<()> {
        let lengths = [
            ("width", self.width),
            ("height", self.height),
            ("thickness", self.thickness),
            ("hole_radius", self.hole_radius),
            ("notch_width", self.notch_width),
        ];
        if let Some((name, value)) = lengths.iter().find(|(_, v)| !(*v > 0.0) || !v.is_finite()) {
            return Err(GridError::InvalidParameter(format!(
                "'{}' must be a positive length; got {}",
                name, value
            )));
        }
        if !(self.ratio_x > 0.0 && self.ratio_x <= 1.0) {
            return Err(GridError::InvalidParameter(format!(
                "'ratio_x' must lie in (0, 1]; got {}",
                self.ratio_x
            )));
        }
        if self.elements_in_z == 0 || self.grid_y_repetitions == 0 {
            return Err(GridError::InvalidParameter(
                "'elements_in_z' and 'grid_y_repetitions' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_f64(params_json: &JsonValue, key: &str, default: f64) -> Result<f64> {
    match &params_json[key] {
        JsonValue::Null => Ok(default),
        value => value.as_f64().ok_or_else(|| {
            GridError::InvalidParameter(format!("'{}' must be a numerical value", key))
        }),
    }
}

fn read_usize(params_json: &JsonValue, key: &str, default: usize) -> Result<usize> {
    match &params_json[key] {
        JsonValue::Null => Ok(default),
        value => value.as_usize().ok_or_else(|| {
            GridError::InvalidParameter(format!("'{}' must be a non-negative integer", key))
        }),
    }
}

fn read_str<'a>(params_json: &'a JsonValue, key: &str) -> Result<Option<&'a str>> {
    match &params_json[key] {
        JsonValue::Null => Ok(None),
        value => value
            .as_str()
            .map(Some)
            .ok_or_else(|| GridError::InvalidParameter(format!("'{}' must be a string", key))),
    }
}
