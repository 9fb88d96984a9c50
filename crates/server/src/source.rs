//! Per-step payload sources.
//!
//! The distributor does not care what it sends; it asks a [`StepSource`] for
//! one encoded frame per slot, fans them out, and calls [`StepSource::advance`]
//! once every send of the step has finished.

use bytes::Bytes;
use protocol::packets::{build_constants, build_file, build_tile};
use protocol::{Quadrant, SimulationConstants, Slot};
use std::path::PathBuf;

use crate::config::{Config, ImagesConfig};
use crate::error::{DimensionError, SourceError};
use crate::field::{Field, Physics};

/// Something that produces one frame per slot per step.
pub trait StepSource: Send {
    /// Frame sent once to each consumer as soon as it registers, if any.
    fn handshake(&self) -> Option<Bytes>;

    /// Encoded frame for `slot` at the current step.
    ///
    /// The returned bytes are an owned copy; later calls to `advance` never
    /// change a frame that has already been handed out.
    fn frame(&self, slot: Slot) -> Result<Bytes, SourceError>;

    /// Move to the next step.
    fn advance(&mut self);

    /// Total number of steps to distribute.
    fn steps(&self) -> u32;
}

/// The field simulation as a tile source.
#[derive(Debug, Clone)]
pub struct FieldSource {
    field: Field,
    physics: Physics,
    constants: SimulationConstants,
}

impl FieldSource {
    pub fn new(field: Field, physics: Physics, constants: SimulationConstants) -> Self {
        Self {
            field,
            physics,
            constants,
        }
    }

    /// Build the seeded field described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, DimensionError> {
        let sim = &config.simulation;
        let field = Field::new(sim.nx, sim.ny, sim.seed)?;
        let physics = Physics::from_config(&config.physics);
        Ok(Self::new(field, physics, config.constants()))
    }

    pub fn field(&self) -> &Field {
        &self.field
    }
}

impl StepSource for FieldSource {
    fn handshake(&self) -> Option<Bytes> {
        Some(build_constants(&self.constants).finish())
    }

    fn frame(&self, slot: Slot) -> Result<Bytes, SourceError> {
        let quadrant = Quadrant::from_slot(slot).ok_or(SourceError::UnknownSlot(slot))?;
        let tile = self.field.tile(quadrant.rect(self.field.nx(), self.field.ny()));
        Ok(build_tile(&tile.values)?.finish())
    }

    fn advance(&mut self) {
        self.field.step(&self.physics);
    }

    fn steps(&self) -> u32 {
        self.constants.max_timesteps.max(0) as u32
    }
}

/// Pre-split image files laid out as `<root>/<quadrant>/<step>.<ext>`,
/// steps numbered from 1.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    root: PathBuf,
    extension: String,
    step: u32,
    steps: u32,
}

impl ImageSequenceSource {
    pub fn new(config: &ImagesConfig, steps: u32) -> Self {
        Self {
            root: config.root.clone(),
            extension: config.extension.clone(),
            step: 1,
            steps,
        }
    }

    /// File sent to `quadrant` at the current step.
    pub fn path_for(&self, quadrant: Quadrant) -> PathBuf {
        self.root
            .join(quadrant.dir_name())
            .join(format!("{}.{}", self.step, self.extension))
    }
}

impl StepSource for ImageSequenceSource {
    fn handshake(&self) -> Option<Bytes> {
        None
    }

    fn frame(&self, slot: Slot) -> Result<Bytes, SourceError> {
        let quadrant = Quadrant::from_slot(slot).ok_or(SourceError::UnknownSlot(slot))?;
        let path = self.path_for(quadrant);
        let data = std::fs::read(&path).map_err(|source| SourceError::Read { path, source })?;
        Ok(build_file(&data).finish())
    }

    fn advance(&mut self) {
        self.step += 1;
    }

    fn steps(&self) -> u32 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_source_frames_are_quadrants() {
        let field = Field::from_values(4, 4, (0..16).collect()).unwrap();
        let source = FieldSource::new(
            field,
            Physics::shift_only(0.0, 0.0),
            SimulationConstants::new(4, 4, 3),
        );

        let frame = source.frame(2).unwrap();
        // Top-right quadrant of 0..16 laid out 4x4: [2, 3, 6, 7].
        let expected = build_tile(&[2, 3, 6, 7]).unwrap().finish();
        assert_eq!(frame, expected);
        assert_eq!(source.steps(), 3);
        assert!(matches!(source.frame(5), Err(SourceError::UnknownSlot(5))));
    }

    #[test]
    fn test_field_source_handshake_is_constants() {
        let source = FieldSource::from_config(&Config::default()).unwrap();
        let handshake = source.handshake().unwrap();
        assert_eq!(&handshake[..4], &[0, 0, 0, 12]);
    }

    #[test]
    fn test_advance_does_not_touch_handed_out_frames() {
        let mut source = FieldSource::new(
            Field::from_values(2, 2, vec![1, 2, 3, 4]).unwrap(),
            Physics::shift_only(1.0, 0.0),
            SimulationConstants::new(2, 2, 2),
        );
        let before = source.frame(1).unwrap();
        let copy = before.clone();
        source.advance();
        assert_eq!(before, copy);
        assert_ne!(source.frame(1).unwrap(), before);
    }

    #[test]
    fn test_image_source_reads_quadrant_layout() {
        let root = std::env::temp_dir().join(format!("quadcast-images-{}", std::process::id()));
        for q in Quadrant::ALL {
            let dir = root.join(q.dir_name());
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("1.png"), [q.slot() as u8; 3]).unwrap();
        }

        let config = ImagesConfig {
            root: root.clone(),
            extension: "png".to_string(),
        };
        let mut source = ImageSequenceSource::new(&config, 2);
        assert!(source.handshake().is_none());

        let frame = source.frame(3).unwrap();
        assert_eq!(&frame[..], &[0, 0, 0, 0, 0, 0, 0, 3, 3, 3, 3]);

        source.advance();
        assert_eq!(source.path_for(Quadrant::TopLeft), root.join("top_left").join("2.png"));
        assert!(matches!(source.frame(1), Err(SourceError::Read { .. })));

        std::fs::remove_dir_all(&root).ok();
    }
}
