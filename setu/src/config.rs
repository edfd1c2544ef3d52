//! Configuration for Setu
//!
//! Loaded once at startup from a TOML file. Every section falls back to its
//! defaults, so an empty file (or no file at all) yields a runnable daemon
//! with the mock engine.

use crate::engine::MockEngineConfig;
use crate::error::{Error, Result};
use crate::io::streaming::{DEFAULT_MAX_FRAME_BYTES, WireFormat};
use crate::sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SetuConfig {
    pub topics: TopicsConfig,
    pub frames: FramesConfig,
    pub robot: RobotConfig,
    pub transform: TransformConfig,
    pub publish: PublishConfig,
    pub sync: SyncConfig,
    pub query: QueryConfig,
    pub network: NetworkConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Bus topic names for every input and output stream
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub left_image: String,
    pub right_image: String,
    pub imu: String,
    pub odom: String,
    pub map_data: String,
    pub map_points: String,
    pub visible_landmarks: String,
    pub visible_landmarks_pose: String,
    pub tf: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            left_image: "left/image_raw".to_string(),
            right_image: "right/image_raw".to_string(),
            imu: "imu".to_string(),
            odom: "odom".to_string(),
            map_data: "map_data".to_string(),
            map_points: "map_points".to_string(),
            visible_landmarks: "visible_landmarks".to_string(),
            visible_landmarks_pose: "visible_landmarks_pose".to_string(),
            tf: "tf".to_string(),
        }
    }
}

/// Coordinate frame names
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramesConfig {
    /// Fixed SLAM map frame
    pub global_frame: String,
    /// Odometry frame (composed mode only)
    pub odom_frame: String,
    /// Robot body frame (direct mode only)
    pub robot_base_frame: String,
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            global_frame: "map".to_string(),
            odom_frame: "odom".to_string(),
            robot_base_frame: "base_link".to_string(),
        }
    }
}

/// Fixed planar offset applied to the SLAM pose before broadcast
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotConfig {
    /// X offset in meters
    pub robot_x: f64,
    /// Y offset in meters
    pub robot_y: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            robot_x: 1.0,
            robot_y: 1.0,
        }
    }
}

/// Transform broadcast behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformConfig {
    /// true: broadcast map → base on every tracked frame.
    /// false: broadcast map → odom on every odometry sample.
    pub no_odometry_mode: bool,
    /// Disable to skip transform broadcast entirely
    pub publish_tf: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            no_odometry_mode: true,
            publish_tf: true,
        }
    }
}

/// Periodic publisher cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublishConfig {
    pub map_data_period_ms: u64,
    pub landmark_period_ms: u64,
    /// Create the landmark-cloud publisher
    pub ros_visualization: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            map_data_period_ms: 1000,
            landmark_period_ms: 1000,
            ros_visualization: true,
        }
    }
}

/// Limits for the landmarks-in-view query
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_landmarks: usize,
    /// Meters
    pub max_distance: f64,
    /// Radians, measured from the camera forward axis
    pub max_angle: f64,
    /// How long the service endpoint waits for the query thread
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_landmarks: 1000,
            max_distance: 5.0,
            max_angle: 2.0,
            timeout_ms: 2000,
        }
    }
}

/// Network endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Inbound sensor stream (images, IMU, odometry)
    pub sensor_address: String,
    /// Outbound stream to visualizers and consumers
    pub publish_address: String,
    /// Request/response query endpoint
    pub service_address: String,
    /// Payload codec; Postcard keeps raw images near their pixel size
    pub wire_format: WireFormat,
    pub max_frame_bytes: usize,
    /// Outbound messages buffered before the oldest is evicted
    pub publish_queue_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            sensor_address: "0.0.0.0:5600".to_string(),
            publish_address: "0.0.0.0:5601".to_string(),
            service_address: "0.0.0.0:5602".to_string(),
            wire_format: WireFormat::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            publish_queue_capacity: 256,
        }
    }
}

/// Tracking engine selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine backend ("mock")
    #[serde(rename = "type")]
    pub engine_type: String,
    pub mock: MockEngineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_type: "mock".to_string(),
            mock: MockEngineConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SetuConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SetuConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or disable a thread
    pub fn validate(&self) -> Result<()> {
        if self.publish.map_data_period_ms == 0 || self.publish.landmark_period_ms == 0 {
            return Err(Error::Config("publish periods must be > 0".to_string()));
        }
        if self.sync.queue_depth == 0 {
            return Err(Error::Config("sync.queue_depth must be > 0".to_string()));
        }
        if self.sync.image_queue_capacity == 0 {
            return Err(Error::Config(
                "sync.image_queue_capacity must be > 0".to_string(),
            ));
        }
        if self.query.max_landmarks == 0
            || self.query.max_distance <= 0.0
            || self.query.max_angle <= 0.0
        {
            return Err(Error::Config("query limits must be positive".to_string()));
        }
        if self.network.publish_queue_capacity == 0 {
            return Err(Error::Config(
                "network.publish_queue_capacity must be > 0".to_string(),
            ));
        }
        if let Some(warning) = self.frame_cap_warning() {
            log::warn!("{}", warning);
        }
        Ok(())
    }

    /// Warning for JSON paired with a frame cap sized for binary images.
    ///
    /// JSON writes each pixel byte as a decimal number, so a 1280x720 rgb8
    /// image already overflows the default cap.
    pub fn frame_cap_warning(&self) -> Option<String> {
        if self.network.wire_format == WireFormat::Json
            && self.network.max_frame_bytes <= DEFAULT_MAX_FRAME_BYTES
        {
            return Some(format!(
                "network.wire_format = \"json\" with max_frame_bytes = {}: \
                 camera images will likely exceed the frame cap, \
                 use \"postcard\" or raise max_frame_bytes",
                self.network.max_frame_bytes
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SetuConfig::default();
        assert_eq!(config.frames.global_frame, "map");
        assert_eq!(config.frames.odom_frame, "odom");
        assert_eq!(config.frames.robot_base_frame, "base_link");
        assert_eq!(config.robot.robot_x, 1.0);
        assert_eq!(config.robot.robot_y, 1.0);
        assert!(config.transform.no_odometry_mode);
        assert!(config.transform.publish_tf);
        assert_eq!(config.publish.map_data_period_ms, 1000);
        assert_eq!(config.query.max_landmarks, 1000);
        assert_eq!(config.engine.engine_type, "mock");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[frames]
global_frame = "world"

[robot]
robot_x = 0.25
robot_y = -0.5

[transform]
no_odometry_mode = false

[network]
wire_format = "json"
max_frame_bytes = 33554432

[engine]
type = "mock"

[engine.mock]
init_frames = 3

[logging]
level = "debug"
"#;

        let config: SetuConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.frames.global_frame, "world");
        // Unset keys in a present section keep their defaults
        assert_eq!(config.frames.odom_frame, "odom");
        assert_eq!(config.robot.robot_x, 0.25);
        assert_eq!(config.robot.robot_y, -0.5);
        assert!(!config.transform.no_odometry_mode);
        assert!(config.transform.publish_tf);
        assert_eq!(config.network.wire_format, WireFormat::Json);
        assert_eq!(config.network.max_frame_bytes, 32 * 1024 * 1024);
        assert!(config.frame_cap_warning().is_none());
        assert_eq!(config.engine.mock.init_frames, 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_wire_format_fits_images() {
        let mut config = SetuConfig::default();
        assert_eq!(config.network.wire_format, WireFormat::Postcard);
        assert!(config.frame_cap_warning().is_none());

        config.network.wire_format = WireFormat::Json;
        assert!(config.frame_cap_warning().is_some());
        // Warning only, the config stays usable
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[publish]\nmap_data_period_ms = 250").unwrap();

        let config = SetuConfig::from_file(file.path()).unwrap();
        assert_eq!(config.publish.map_data_period_ms, 250);
        assert_eq!(config.publish.landmark_period_ms, 1000);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nqueue_depth = 0").unwrap();

        let err = SetuConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[robot\nrobot_x = ").unwrap();

        assert!(matches!(
            SetuConfig::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
