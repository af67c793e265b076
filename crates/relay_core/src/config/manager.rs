//! Config manager for loading, saving, and atomic updates.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Section-level updates (only modified section is changed)
//! - Validation on load, including the topology table
//! - Preserves comments and formatting with toml_edit

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};
use crate::orchestrator::TopologyError;

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages the settings file.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Create a manager for the given file.
    ///
    /// Does not load the config - call `load()` or `load_or_create()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable settings. Changes stay in memory until `save()` or
    /// `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = parse_and_validate(&content)?;
        Ok(())
    }

    /// Load config from file, creating with defaults if it doesn't exist.
    ///
    /// Rewrites the file when unknown sections or missing defaults were found.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = parse_validate_and_clean(&content)?;
            self.settings = settings;

            if was_modified {
                tracing::info!("Normalizing config file {}", self.config_path.display());
                self.save()?;
            }
        } else {
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Create the temp, storage and logs directories if missing.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let dirs = [
            &self.settings.paths.temp_root,
            &self.settings.paths.storage_root,
            &self.settings.paths.logs_folder,
        ];

        for dir in dirs {
            let path = PathBuf::from(dir);
            if !path.exists() {
                fs::create_dir_all(&path)?;
            }
        }

        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    pub fn temp_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.temp_root)
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.storage_root)
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Update a specific section atomically.
    ///
    /// Re-reads the file from disk, replaces only the given table and writes
    /// back atomically, so other sections keep their on-disk content.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        if section == ConfigSection::Topology {
            self.settings.topology.build()?;
        }

        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_toml = match section {
            ConfigSection::Bus => toml::to_string_pretty(&self.settings.bus)?,
            ConfigSection::Store => toml::to_string_pretty(&self.settings.store)?,
            ConfigSection::Paths => toml::to_string_pretty(&self.settings.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
            ConfigSection::Transform => toml::to_string_pretty(&self.settings.transform)?,
            ConfigSection::Topology => toml::to_string_pretty(&self.settings.topology)?,
        };

        let section_doc: DocumentMut = section_toml.parse()?;
        let section_table = section_doc.as_table().clone();

        doc[section.table_name()] = Item::Table(section_table);

        self.atomic_write(&doc.to_string())?;

        Ok(())
    }

    /// Serialize the settings with a comment above each section header.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let body = toml::to_string_pretty(&self.settings)?;

        let mut output = String::new();
        output.push_str("# Relay configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n\n",
        );

        for line in body.lines() {
            let header = line.trim();
            let section = ConfigSection::ALL
                .iter()
                .find(|s| header == format!("[{}]", s.table_name()));
            if let Some(section) = section {
                if !output.ends_with("\n\n") {
                    output.push('\n');
                }
                output.push_str("# ");
                output.push_str(section.description());
                output.push('\n');
            }
            output.push_str(line);
            output.push('\n');
        }

        Ok(output)
    }

    /// Write to a temp file beside the config, then rename over it.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn parse_and_validate(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.topology.build()?;
    Ok(settings)
}

/// Parse and validate, reporting whether the file needs rewriting.
fn parse_validate_and_clean(content: &str) -> ConfigResult<(Settings, bool)> {
    let doc: DocumentMut = content.parse()?;
    let settings = parse_and_validate(content)?;

    let has_unknown = doc
        .iter()
        .any(|(key, _)| !ConfigSection::ALL.iter().any(|s| s.table_name() == key));

    let reserialized = toml::to_string_pretty(&settings)?;
    let was_modified = has_unknown || strip_comments(content) != strip_comments(&reserialized);

    Ok((settings, was_modified))
}

/// Non-empty, non-comment lines, for comparing files modulo comments.
fn strip_comments(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}
