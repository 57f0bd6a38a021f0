//! Tunable constants for the pipeline, exposed as CLI flags. Defaults match
//! the reference camera setup (320x224 frames, three detection zones, 224px
//! crop windows).

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

/// Height in pixels of the telemetry header band drawn across the frame.
pub const HEADER_HEIGHT: u32 = 20;

/// One named detection zone and the horizontal offset of its crop window.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub name: String,
    pub offset: u32,
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, offset) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <name>=<offset>, got '{s}'"))?;
        let offset = offset
            .parse::<u32>()
            .map_err(|e| format!("bad offset in '{s}': {e}"))?;
        Ok(Zone {
            name: name.to_string(),
            offset,
        })
    }
}

/// How probabilities arriving on the wire map onto the frame.
#[derive(Debug, Clone)]
pub enum ZoneLayout {
    /// Several named zones, each with its own probability (`"probs"` field).
    Zones(Vec<Zone>),
    /// One scalar probability for the whole frame (`"prob_target"` field).
    SingleTarget,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "jetson_pilot",
    about = "Live console for a Jetson vision telemetry stream"
)]
pub struct Config {
    /// ZeroMQ endpoint the vision sensor publishes on.
    #[arg(long, default_value = "tcp://192.168.37.22:5555")]
    pub publisher: String,

    /// Address the HTTP console listens on.
    #[arg(long, default_value = "0.0.0.0:5000")]
    pub listen: String,

    /// Expected camera frame width in pixels.
    #[arg(long, default_value_t = 320)]
    pub frame_width: u32,

    /// Expected camera frame height in pixels.
    #[arg(long, default_value_t = 224)]
    pub frame_height: u32,

    /// Side length of each zone's crop window (and of center-cropped photos).
    #[arg(long, default_value_t = 224)]
    pub crop_size: u32,

    /// Detection zones as <name>=<x-offset> pairs.
    #[arg(long, value_delimiter = ',', default_value = "left=0,center=48,right=95")]
    pub zones: Vec<Zone>,

    /// Run in single-target mode: the sensor sends one scalar probability.
    #[arg(long)]
    pub single_target: bool,

    /// Probability above which a zone is drawn emphasized.
    #[arg(long, default_value_t = 0.60)]
    pub display_threshold: f64,

    /// Probability above which the single-target label reads TARGET.
    #[arg(long, default_value_t = 0.70)]
    pub decision_threshold: f64,

    /// Directory snapshot photos are saved into.
    #[arg(long, default_value = "dataset_capture")]
    pub dataset_dir: PathBuf,

    /// Directory recordings are written into.
    #[arg(long, default_value = ".")]
    pub recording_dir: PathBuf,

    /// Frame rate stamped into recorded video files.
    #[arg(long, default_value_t = 20.0)]
    pub recording_fps: f64,

    /// Center-crop snapshots to crop_size before saving.
    #[arg(long)]
    pub center_crop: bool,
}

impl Config {
    pub fn layout(&self) -> ZoneLayout {
        if self.single_target {
            ZoneLayout::SingleTarget
        } else {
            ZoneLayout::Zones(self.zones.clone())
        }
    }

    /// Horizontal offset of a crop window centered in the frame.
    pub fn center_offset(&self) -> u32 {
        (self.frame_width.saturating_sub(self.crop_size)) / 2
    }
}
