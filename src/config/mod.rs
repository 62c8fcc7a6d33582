//! Configuration module.
//!
//! TOML configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `SERIAL_HANDLE_API_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `~/.config/serial-handle-api/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-handle-api\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `SERIAL_HANDLE_API_SERIAL_DEFAULT_BITRATE=115200`
//! - `SERIAL_HANDLE_API_SERIAL_READ_TIMEOUT_MS=50`
//! - `SERIAL_HANDLE_API_SERIAL_READ_CHUNK_SIZE=4096`
//! - `SERIAL_HANDLE_API_LOGGING_LEVEL=debug`
//! - `SERIAL_HANDLE_API_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_handle_api::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?.into_config();
//! println!("Default bitrate: {}", config.serial.default_bitrate);
//! # Ok::<(), serial_handle_api::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
