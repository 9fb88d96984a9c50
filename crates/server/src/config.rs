//! Producer configuration.

use protocol::SimulationConstants;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::DimensionError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
}

impl Config {
    /// Load configuration from `path` or write and use defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    /// Check dimensions and consumer count. Called before any socket is bound.
    pub fn validate(&self) -> Result<(), DimensionError> {
        let sim = &self.simulation;
        if sim.nx <= 0 || sim.ny <= 0 {
            return Err(DimensionError::NonPositive {
                nx: sim.nx,
                ny: sim.ny,
            });
        }
        if sim.max_timesteps < 0 {
            return Err(DimensionError::Timesteps(sim.max_timesteps));
        }
        if !matches!(self.server.consumers, 1 | 4) {
            return Err(DimensionError::ConsumerCount(self.server.consumers));
        }
        Ok(())
    }

    /// The immutable constants triple sent to every consumer.
    pub fn constants(&self) -> SimulationConstants {
        SimulationConstants::new(
            self.simulation.nx,
            self.simulation.ny,
            self.simulation.max_timesteps,
        )
    }
}

/// What to do with a consumer whose send fails or times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop serving that consumer and continue with the rest.
    #[default]
    Drop,
    /// End the whole run.
    Abort,
}

/// Where per-step payloads come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Run the field simulation and send integer tiles.
    #[default]
    Field,
    /// Send pre-split quadrant image files from disk.
    Images,
}

/// Server networking and distribution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Number of consumers (1 or 4).
    #[serde(default = "default_consumers")]
    pub consumers: u32,
    /// How long a new connection may take to send its slot index.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
    /// Upper bound on one frame send to one consumer.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Wait for a line on stdin once every slot is registered.
    #[serde(default)]
    pub wait_for_start: bool,
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            consumers: default_consumers(),
            handshake_timeout_ms: default_handshake_timeout(),
            send_timeout_ms: default_send_timeout(),
            failure_policy: FailurePolicy::default(),
            wait_for_start: false,
        }
    }
}

fn default_port() -> u16 {
    5050
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_consumers() -> u32 {
    1
}
fn default_handshake_timeout() -> u64 {
    10_000
}
fn default_send_timeout() -> u64 {
    5_000
}

/// Grid and run length.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Grid rows.
    #[serde(default = "default_grid_size")]
    pub nx: i32,
    /// Grid columns.
    #[serde(default = "default_grid_size")]
    pub ny: i32,
    #[serde(default = "default_max_timesteps")]
    pub max_timesteps: i32,
    /// Seed for the initial field.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Pause after every step, in milliseconds.
    #[serde(default = "default_step_interval")]
    pub step_interval_ms: u64,
    #[serde(default)]
    pub source: SourceKind,
}

impl SimulationConfig {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nx: default_grid_size(),
            ny: default_grid_size(),
            max_timesteps: default_max_timesteps(),
            seed: default_seed(),
            step_interval_ms: default_step_interval(),
            source: SourceKind::default(),
        }
    }
}

fn default_grid_size() -> i32 {
    64
}
fn default_max_timesteps() -> i32 {
    200
}
fn default_seed() -> u64 {
    42
}
fn default_step_interval() -> u64 {
    200
}

/// Advection/diffusion coefficients.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhysicsConfig {
    /// Spatial step (m).
    #[serde(default = "default_dx")]
    pub dx: f64,
    /// Time step (s). Fixed, independent of the run length.
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Horizontal velocity (m/s).
    #[serde(default = "default_u0")]
    pub u0: f64,
    /// Vertical velocity (m/s).
    #[serde(default = "default_v0")]
    pub v0: f64,
    #[serde(default = "default_diffusion")]
    pub kx: f64,
    #[serde(default = "default_diffusion")]
    pub ky: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dx: default_dx(),
            dt: default_dt(),
            u0: default_u0(),
            v0: default_v0(),
            kx: default_diffusion(),
            ky: default_diffusion(),
        }
    }
}

fn default_dx() -> f64 {
    1000.0
}
fn default_dt() -> f64 {
    200.0
}
fn default_u0() -> f64 {
    10.0
}
fn default_v0() -> f64 {
    5.0
}
fn default_diffusion() -> f64 {
    0.00001
}

/// Image-sequence source layout: `<root>/<quadrant>/<step>.<extension>`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagesConfig {
    #[serde(default = "default_images_root")]
    pub root: PathBuf,
    #[serde(default = "default_images_extension")]
    pub extension: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            root: default_images_root(),
            extension: default_images_extension(),
        }
    }
}

fn default_images_root() -> PathBuf {
    PathBuf::from("output_parts")
}
fn default_images_extension() -> String {
    "png".to_string()
}
