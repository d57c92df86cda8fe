//! Linux GPIO character device backend
//!
//! Uses /dev/gpiochipX through gpiocdev, which speaks both the v1 and v2
//! uAPI so bias and edge detection are part of the kernel request. Edge waits
//! run on the blocking pool in bounded slices.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use gpiocdev::chip::Chip;
use gpiocdev::line::{self, EdgeDetection, Value};
use gpiocdev::Request;
use tokio::time::Instant;
use tracing::{info, trace, warn};

use super::{Bias, EdgeDetect, EdgePin, PinLevel};
use crate::error::{AppError, Result};

const CONSUMER: &str = "edge-boot";
const DEFAULT_CHIP: &str = "/dev/gpiochip0";

/// Longest single blocking wait, so a cancelled wait frees its thread quickly
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// How a pin identifier addresses a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinSpec {
    /// Line name published by the chip driver, e.g. `GPIO17`
    Named(String),
    /// Explicit chip device and line offset
    ChipOffset { chip: PathBuf, offset: u32 },
}

impl PinSpec {
    /// Parse `gpiochipN:OFFSET`, `/dev/gpiochipN:OFFSET`, a bare offset, or a line name
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Ok(offset) = raw.parse::<u32>() {
            return Self::ChipOffset {
                chip: PathBuf::from(DEFAULT_CHIP),
                offset,
            };
        }

        if let Some((chip, offset)) = raw.rsplit_once(':') {
            let chip_name = chip.trim_start_matches("/dev/");
            if chip_name.starts_with("gpiochip") {
                if let Ok(offset) = offset.parse::<u32>() {
                    return Self::ChipOffset {
                        chip: PathBuf::from(format!("/dev/{}", chip_name)),
                        offset,
                    };
                }
            }
        }

        Self::Named(raw.to_string())
    }
}

/// A located but not yet requested GPIO line
pub struct GpioLine {
    chip: PathBuf,
    offset: u32,
    description: String,
}

/// Locate a GPIO line by identifier
pub fn lookup(name: &str) -> Result<GpioLine> {
    match PinSpec::parse(name) {
        PinSpec::ChipOffset { chip, offset } => {
            let info = Chip::from_path(&chip)
                .and_then(|c| c.info())
                .map_err(|e| {
                    AppError::PinNotFound(format!("{} ({}: {})", name, chip.display(), e))
                })?;
            if offset >= info.num_lines {
                return Err(AppError::PinNotFound(format!(
                    "{} (chip {} has {} lines)",
                    name, info.name, info.num_lines
                )));
            }
            Ok(GpioLine::new(chip, offset, &info.name, &info.label))
        }
        PinSpec::Named(wanted) => {
            let found = gpiocdev::find_named_line(&wanted)
                .ok_or_else(|| AppError::PinNotFound(wanted.clone()))?;
            let (chip_name, label) = match Chip::from_path(&found.chip).and_then(|c| c.info()) {
                Ok(info) => (info.name, info.label),
                Err(_) => (found.chip.display().to_string(), String::new()),
            };
            Ok(GpioLine::new(found.chip, found.info.offset, &chip_name, &label))
        }
    }
}

/// Kernel bias for the requested line
pub fn line_bias(bias: Bias) -> line::Bias {
    match bias {
        Bias::PullDown => line::Bias::PullDown,
        Bias::PullUp => line::Bias::PullUp,
        Bias::Disabled => line::Bias::Disabled,
    }
}

/// Kernel edge detection for the requested line
pub fn line_edges(edges: EdgeDetect) -> EdgeDetection {
    match edges {
        EdgeDetect::Rising => EdgeDetection::RisingEdge,
        EdgeDetect::Falling => EdgeDetection::FallingEdge,
        EdgeDetect::Both => EdgeDetection::BothEdges,
    }
}

impl GpioLine {
    fn new(chip: PathBuf, offset: u32, chip_name: &str, label: &str) -> Self {
        let description = format!("{} ({}) line {}", chip_name, label, offset);
        Self {
            chip,
            offset,
            description,
        }
    }

    /// Log what the kernel reports for this line
    pub fn log_info(&self) {
        match Chip::from_path(&self.chip).and_then(|c| c.line_info(self.offset)) {
            Ok(info) => info!(
                "{}: name={} consumer={} direction={:?} used={}",
                self.description, info.name, info.consumer, info.direction, info.used
            ),
            Err(e) => warn!("Failed to query {}: {}", self.description, e),
        }
    }

    /// Request the line as an input with the given bias and edge detection
    ///
    /// A kernel that rejects the bias or edge settings fails the request.
    pub fn configure_input(self, bias: Bias, edges: EdgeDetect) -> Result<CdevPin> {
        let request = Request::builder()
            .on_chip(&self.chip)
            .with_consumer(CONSUMER)
            .with_line(self.offset)
            .as_input()
            .with_bias(line_bias(bias))
            .with_edge_detection(line_edges(edges))
            .request()
            .map_err(|e| {
                AppError::Gpio(format!(
                    "Input request on {} ({:?} bias, {:?} edges) failed: {}",
                    self.description, bias, edges, e
                ))
            })?;

        info!(
            "{} configured as input, bias {:?}, edges {:?}",
            self.description, bias, edges
        );
        Ok(CdevPin {
            request: Some(request),
            offset: self.offset,
            description: self.description,
        })
    }
}

/// Requested input line
///
/// The request moves into the blocking pool for each wait slice. If a wait
/// is cancelled mid-slice the request is released and later calls fail.
pub struct CdevPin {
    request: Option<Request>,
    offset: u32,
    description: String,
}

impl CdevPin {
    pub fn description(&self) -> &str {
        &self.description
    }

    fn released(&self) -> AppError {
        AppError::Gpio(format!("{} is no longer requested", self.description))
    }
}

fn wait_slice(request: &Request, slice: Duration) -> gpiocdev::Result<bool> {
    if !request.wait_edge_event(slice)? {
        return Ok(false);
    }
    let event = request.read_edge_event()?;
    trace!("{:?} edge at {}ns", event.kind, event.timestamp_ns);
    Ok(true)
}

#[async_trait]
impl EdgePin for CdevPin {
    async fn wait_for_edge(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let slice = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(WAIT_SLICE),
                None => WAIT_SLICE,
            };

            let request = self.request.take().ok_or_else(|| self.released())?;
            let (request, result) = tokio::task::spawn_blocking(move || {
                let result = wait_slice(&request, slice);
                (request, result)
            })
            .await
            .map_err(|e| AppError::Internal(format!("GPIO wait task failed: {}", e)))?;
            self.request = Some(request);

            if result? {
                return Ok(true);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(false);
            }
        }
    }

    fn read(&self) -> Result<PinLevel> {
        let request = self.request.as_ref().ok_or_else(|| self.released())?;
        let level = match request.value(self.offset)? {
            Value::Active => PinLevel::High,
            Value::Inactive => PinLevel::Low,
        };
        Ok(level)
    }
}
