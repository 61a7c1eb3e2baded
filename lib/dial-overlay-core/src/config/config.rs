use crate::overlay::ChatOverlayManagerOptions;
use crate::paths;
use log::{trace, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The path the config file was loaded from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// How long a request waits for its response before failing, in milliseconds
    pub request_timeout_ms: u64,
    /// Duration of the overlay slide in/out transition in milliseconds
    pub animation_ms: u32,
    /// Distance between an overlay (and its toggle button) and the screen edges
    pub edge_offset: String,
    /// Overlay width when not set per overlay
    pub default_width: String,
    /// Overlay height when not set per overlay
    pub default_height: String,
    /// Overlay z-index when not set per overlay
    pub default_z_index: String,
    /// Portrait viewports at most this wide (px) use the full-screen mobile layout
    pub mobile_max_width: u32,
    /// Landscape viewports at most this tall (px) use the full-screen mobile layout
    pub mobile_max_height: u32,
    /// Look of the floating button that opens an overlay
    pub toggle_button: ToggleButtonConfig,
    /// Overlays to create on startup
    pub overlays: Vec<ChatOverlayManagerOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleButtonConfig {
    /// Width and height of the circular button
    pub size: String,
    pub background: String,
    pub color: String,
    /// Inline SVG markup rendered inside the button
    pub icon_svg: String,
}

impl Default for ToggleButtonConfig {
    fn default() -> Self {
        Self {
            size: "60px".to_string(),
            background: "#5c8dea".to_string(),
            color: "#ffffff".to_string(),
            icon_svg: concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" "#,
                r#"fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" "#,
                r#"stroke-linejoin="round"><path d="M21 15a2 2 0 0 1-2 2H7l-4 4V5a2 2 0 0 1 2-2h14a2 2 0 0 1 2 2z"/></svg>"#
            )
            .to_string(),
        }
    }
}

static CURRENT_CONFIG: Lazy<Arc<RwLock<Config>>> =
    Lazy::new(|| Arc::new(RwLock::new(Config::default())));

impl Config {
    pub fn default_config_path() -> Option<PathBuf> {
        paths::default_config_path()
    }

    pub fn load(config_path: Option<&Path>, save: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => {
                Self::default_config_path().ok_or("Could not determine default config directory")?
            }
        };

        if !path.exists() {
            Self::create_default_config_file(&path)?;
            trace!("Created default config file at: {}", path.display());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let mut config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config.validate()?;
        config.config_path = Some(path.clone());

        // Write back so the file lists every field, including ones filled in from defaults
        if save {
            if let Err(e) = config.save_to_file(&path) {
                warn!("Failed to update config file with missing fields: {e}");
            }
        }

        Ok(config)
    }

    fn create_default_config_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = Config::default();
        default_config.save_to_file(path)?;
        Ok(())
    }

    /// Checks the values that would otherwise only fail when an overlay is created.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("request_timeout_ms must be greater than 0".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for overlay in &self.overlays {
            overlay.validate().map_err(|e| e.to_string())?;
            if !seen.insert(overlay.id.as_str()) {
                return Err(format!("Duplicate overlay id '{}'", overlay.id));
            }
        }
        Ok(())
    }

    pub fn set_config(config: Config) {
        if let Ok(mut global_config) = CURRENT_CONFIG.write() {
            *global_config = config;
        }
    }

    pub fn current() -> std::sync::RwLockReadGuard<'static, Config> {
        CURRENT_CONFIG.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn request_timeout_ms() -> u64 {
        Self::current().request_timeout_ms
    }

    pub fn animation_ms() -> u32 {
        Self::current().animation_ms
    }

    pub fn edge_offset() -> String {
        Self::current().edge_offset.clone()
    }

    pub fn default_width() -> String {
        Self::current().default_width.clone()
    }

    pub fn default_height() -> String {
        Self::current().default_height.clone()
    }

    pub fn default_z_index() -> String {
        Self::current().default_z_index.clone()
    }

    pub fn mobile_max_width() -> u32 {
        Self::current().mobile_max_width
    }

    pub fn mobile_max_height() -> u32 {
        Self::current().mobile_max_height
    }

    pub fn toggle_button() -> ToggleButtonConfig {
        Self::current().toggle_button.clone()
    }

    /// Save the current config to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = "# DIAL Overlay Configuration File\n# Defaults for embedded chat overlays and the overlays to create.\n\n";
        let serialized_config = serde_yaml::to_string(self)?;
        let config_content = format!("{}{}", header, serialized_config);

        fs::write(path, config_content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            request_timeout_ms: 10_000,
            animation_ms: 500,
            edge_offset: "20px".to_string(),
            default_width: "540px".to_string(),
            default_height: "540px".to_string(),
            default_z_index: "5".to_string(),
            mobile_max_width: 550,
            mobile_max_height: 550,
            toggle_button: ToggleButtonConfig::default(),
            overlays: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::OverlayPosition;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config::load(Some(&path), false).unwrap();
        assert!(path.exists());
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.default_width, "540px");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# DIAL Overlay Configuration File"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
request_timeout_ms: 2500
overlays:
  - id: support
    domain: https://chat.example
    hostDomain: https://shop.example
    position: left-top
    allowFullscreen: true
    enabledFeatures: [header, footer]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), true).unwrap();
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.animation_ms, 500);
        assert_eq!(config.overlays.len(), 1);

        let overlay = &config.overlays[0];
        assert_eq!(overlay.id, "support");
        assert_eq!(overlay.position, OverlayPosition::LeftTop);
        assert!(overlay.allow_fullscreen);
        assert_eq!(overlay.overlay.domain, "https://chat.example");

        // Saving back keeps every field
        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("mobile_max_width"));
    }

    #[test]
    fn test_duplicate_overlay_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
overlays:
  - { id: a, domain: "https://chat.example", hostDomain: "https://host.example" }
  - { id: a, domain: "https://chat.example", hostDomain: "https://host.example" }
"#,
        )
        .unwrap();

        let error = Config::load(Some(&path), false).unwrap_err();
        assert!(error.to_string().contains("Duplicate overlay id 'a'"));
    }

    #[test]
    fn test_invalid_overlay_is_rejected() {
        let mut config = Config::default();
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
