// src/record.rs - Session recording of emitted locations to CSV
use crate::locate::Location;
use anyhow::{Context, Result};
use chrono::Local;
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct LocationRecord {
    timestamp: f64,
    frame: u64,
    index: usize,

    // relative mode
    depth: Option<f64>,
    offset: Option<f64>,

    // absolute mode
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl LocationRecord {
    fn new(timestamp: f64, frame: u64, index: usize, location: &Location) -> Self {
        let mut record = Self {
            timestamp,
            frame,
            index,
            depth: None,
            offset: None,
            x: None,
            y: None,
            z: None,
        };
        match location {
            Location::Relative { depth, offset } => {
                record.depth = Some(*depth);
                record.offset = Some(*offset);
            }
            Location::Absolute(p) => {
                record.x = Some(p.x);
                record.y = Some(p.y);
                record.z = Some(p.z);
            }
        }
        record
    }

    fn location(&self) -> Option<Location> {
        match (self.x, self.y, self.z, self.depth, self.offset) {
            (Some(x), Some(y), Some(z), _, _) => Some(Location::absolute(x, y, z)),
            (_, _, _, Some(depth), Some(offset)) => Some(Location::relative(depth, offset)),
            _ => None,
        }
    }
}

/// Collects per-frame locations during a run and writes them out as one CSV
/// per session.
pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    frames: Vec<(f64, u64, Vec<Location>)>,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name =
            session_name.unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            frames: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn add_frame(&mut self, timestamp: f64, frame: u64, locations: &[Location]) {
        if !locations.is_empty() {
            self.frames.push((timestamp, frame, locations.to_vec()));
        }
    }

    pub fn len(&self) -> usize {
        self.frames.iter().map(|(_, _, locations)| locations.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Writes `<output_dir>/<session>/locations.csv`.
    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.output_dir.join(&self.session_name).join("locations.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for (timestamp, frame, locations) in &self.frames {
            for (index, location) in locations.iter().enumerate() {
                writer.serialize(LocationRecord::new(*timestamp, *frame, index, location))?;
            }
        }

        writer.flush()?;
        Ok(csv_path)
    }
}

/// Reads locations back from a recorded CSV. Rows with neither form filled in
/// are skipped.
pub fn read_locations(path: impl AsRef<Path>) -> Result<Vec<Location>> {
    let path = path.as_ref();
    let mut reader = Reader::from_path(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut locations = Vec::new();
    for row in reader.deserialize::<LocationRecord>() {
        let record = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        locations.extend(record.location());
    }
    Ok(locations)
}
