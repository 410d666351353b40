use crate::d2q9::{EngineKind, Parameters, Property};
use crate::error::{LbmError, Result};
use crate::global_variables::*;
use crate::grid::Grid;
use crate::obstacle::ObstacleKind;
use crate::post::PostResult;
use colored::*;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DATA_PATH: &str = "./data";

pub const PRE_PROCESSING_PATH: &str = "./pre_processing";

pub const CASE_SETUP_FILE: &str = "case_setup.jou";

pub const POST_PROCESSING_PATH: &str = "./post_processing";

pub const BENCHMARK_FILE: &str = "benchmark_elapsed_time.dat";

pub fn create_case_directories() -> io::Result<()> {
    let list_of_paths = [DATA_PATH, PRE_PROCESSING_PATH, POST_PROCESSING_PATH];
    for path_str in list_of_paths {
        let path = Path::new(path_str);
        if !path.exists() {
            println!("Creating the {} path.\n", path_str.yellow().bold());
            fs::create_dir_all(path)?;
        }
    }
    Ok(())
}

pub fn read_case_setup() -> io::Result<HashMap<String, String>> {
    let path = Path::new(PRE_PROCESSING_PATH).join(CASE_SETUP_FILE);
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(extract_parameters(&contents))
}

/// `key = value` pairs, one per line; `#` starts a comment line.
pub fn extract_parameters(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect::<HashMap<String, String>>()
}

/// Everything a run needs besides the engine's own state.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseSetup {
    pub case_name: String,
    pub height: usize,
    pub width: usize,
    pub viscosity: Float,
    pub inflow_velocity: [Float; 2],
    pub obstacle: ObstacleKind,
    pub frames: usize,
    pub steps_per_frame: usize,
    pub engine: EngineKind,
    /// Frames between property field dumps; 0 disables them.
    pub write_frequency: usize,
    pub property: Property,
}

impl Default for CaseSetup {
    fn default() -> Self {
        Self {
            case_name: String::from(CASE_NAME),
            height: HEIGHT,
            width: WIDTH,
            viscosity: VISCOSITY,
            inflow_velocity: INFLOW_VELOCITY,
            obstacle: ObstacleKind::Cylinder,
            frames: FRAMES,
            steps_per_frame: STEPS_PER_FRAME,
            engine: EngineKind::Parallel,
            write_frequency: 0,
            property: Property::Speed,
        }
    }
}

fn parse_entry<T: FromStr>(parameters: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match parameters.get(key) {
        None => Ok(None),
        Some(value) if value.is_empty() => Err(LbmError::MissingParameter(key.to_string())),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| LbmError::invalid_parameter(key, value.as_str())),
    }
}

impl CaseSetup {
    /// Overrides the defaults with whatever keys `parameters` carries.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self> {
        let mut setup = Self::default();
        if let Some(case_name) = parameters.get("case_name") {
            setup.case_name = case_name.clone();
        }
        if let Some(height) = parse_entry(parameters, "height")? {
            setup.height = height;
        }
        if let Some(width) = parse_entry(parameters, "width")? {
            setup.width = width;
        }
        if setup.height < 3 || setup.width < 3 {
            return Err(LbmError::invalid_parameter(
                "height/width",
                format!("{}x{}", setup.height, setup.width),
            ));
        }
        if let Some(viscosity) = parse_entry::<Float>(parameters, "viscosity")? {
            if viscosity <= 0.0 {
                return Err(LbmError::invalid_parameter("viscosity", viscosity.to_string()));
            }
            setup.viscosity = viscosity;
        }
        if let Some(inflow) = parameters.get("inflow_velocity") {
            let components = inflow
                .split_whitespace()
                .map(|component| component.parse::<Float>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| LbmError::invalid_parameter("inflow_velocity", inflow.as_str()))?;
            match components.as_slice() {
                [ux, uy] => setup.inflow_velocity = [*ux, *uy],
                _ => return Err(LbmError::invalid_parameter("inflow_velocity", inflow.as_str())),
            }
        }
        if let Some(obstacle) = parse_entry(parameters, "obstacle")? {
            setup.obstacle = obstacle;
        }
        if let Some(frames) = parse_entry(parameters, "frames")? {
            setup.frames = frames;
        }
        if let Some(steps_per_frame) = parse_entry(parameters, "steps_per_frame")? {
            setup.steps_per_frame = steps_per_frame;
        }
        if let Some(engine) = parse_entry(parameters, "engine")? {
            setup.engine = engine;
        }
        if let Some(write_frequency) = parse_entry(parameters, "write_frequency")? {
            setup.write_frequency = write_frequency;
        }
        if let Some(property) = parse_entry(parameters, "property")? {
            setup.property = property;
        }
        Ok(setup)
    }

    /// Reads the case setup file when there is one, the defaults otherwise.
    pub fn load() -> Result<Self> {
        let case_setup_path = Path::new(PRE_PROCESSING_PATH).join(CASE_SETUP_FILE);
        if case_setup_path.exists() {
            println!(
                "Reading the case setup file: {}.\n",
                case_setup_path.display().to_string().yellow().bold()
            );
            let parameters = read_case_setup()?;
            Self::from_parameters(&parameters)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parameters(&self) -> Parameters {
        Parameters::new(self.viscosity).with_inflow(self.inflow_velocity)
    }

    pub fn print(&self) {
        let rows = [
            ("case", self.case_name.clone()),
            ("grid", format!("{} x {}", self.height, self.width)),
            ("viscosity", format!("{}", self.viscosity)),
            ("omega", format!("{:.6}", self.parameters().omega())),
            (
                "inflow",
                format!("({}, {})", self.inflow_velocity[0], self.inflow_velocity[1]),
            ),
            ("obstacle", format!("{:?}", self.obstacle)),
            ("engine", self.engine.to_string()),
            (
                "frames",
                format!("{} x {} steps", self.frames, self.steps_per_frame),
            ),
        ];
        for (key, value) in rows {
            println!("{:>12} {}", key.cyan().bold(), value);
        }
        println!();
    }
}

/// Appends one row of `post_results` for `time_step` to `file_name`.
///
/// The header row is written with the first step.
pub fn write_post_results(
    post_results: &[PostResult],
    time_step: usize,
    file_name: &str,
) -> io::Result<()> {
    let path = Path::new(POST_PROCESSING_PATH).join(file_name);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if time_step == 0 {
        write!(file, "{:>8}", "step")?;
        for post_result in post_results {
            write!(file, " {:>16}", post_result.name)?;
        }
        writeln!(file)?;
    }
    write!(file, "{:>8}", time_step)?;
    for post_result in post_results {
        write!(file, " {:>16.8e}", post_result.value)?;
    }
    writeln!(file)?;
    Ok(())
}

/// Writes a one-channel field as `x y value` rows to `data/<property>_<step>.dat`.
pub fn write_property_field(
    field: &Grid<'_>,
    property: Property,
    time_step: usize,
) -> io::Result<()> {
    let path = Path::new(DATA_PATH).join(format!("{}_{:08}.dat", property.name(), time_step));
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{:>8} {:>8} {:>16}", "x", "y", property.name())?;
    for y in 0..field.height() {
        for x in 0..field.width() {
            writeln!(file, "{:>8} {:>8} {:>16.8e}", x, y, field.get(y, x, 0))?;
        }
    }
    file.flush()
}

pub fn write_inside_loop_elapsed_time(
    elapsed_times: &[(&str, Duration)],
    time_step: &usize,
) -> io::Result<()> {
    let path = Path::new(POST_PROCESSING_PATH).join(BENCHMARK_FILE);
    let write_header = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if write_header {
        write!(file, "{:>8}", "steps")?;
        for (key, _) in elapsed_times {
            write!(file, " {:>16}", key)?;
        }
        writeln!(file)?;
    }
    write!(file, "{:>8}", time_step)?;
    for (_, value) in elapsed_times {
        write!(file, " {:>16.8e}", value.as_secs_f64())?;
    }
    writeln!(file)?;
    Ok(())
}
