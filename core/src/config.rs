/*
 * config.rs
 * Copyright (C) 2026 The Posterer Authors
 *
 * This file is part of Posterer, a workbench for composing HTTP requests.
 *
 * Posterer is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Posterer is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Posterer.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Executor settings: default timeout, User-Agent, response body limit.
//!
//! Stored in ~/.posterer/settings.xml. Requests, proxies and keystores are not stored here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!("Posterer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O: {0}")]
    Io(#[from] io::Error),
    #[error("settings XML: {0}")]
    Xml(String),
    #[error("invalid value for <{element}>: {value}")]
    Value { element: String, value: String },
}

/// Settings the executor applies to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Used when a submission does not carry its own timeout.
    pub default_timeout: Duration,
    pub user_agent: String,
    /// Response bodies beyond this many bytes are truncated.
    pub max_body_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY,
        }
    }
}

/// Default config directory: ~/.posterer.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".posterer"))
}

/// Default settings path: ~/.posterer/settings.xml.
pub fn default_settings_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("settings.xml"))
}

impl ExecutorConfig {
    /// Load settings from `path`. A missing file yields defaults; unknown elements are ignored.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_xml(&content)
    }

    /// Parse `<settings><timeout>..</timeout><user-agent>..</user-agent><max-body>..</max-body></settings>`.
    pub fn from_xml(content: &str) -> Result<Self, SettingsError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut config = Self::default();
        let mut element_name = Vec::<u8>::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Err(e) => return Err(xml_err(e)),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    element_name.clear();
                    element_name.extend_from_slice(e.name().as_ref());
                }
                Ok(Event::Text(e)) => {
                    if element_name.is_empty() {
                        continue;
                    }
                    let text = e
                        .unescape()
                        .map_err(xml_err)?
                        .trim()
                        .to_string();
                    match element_name.as_slice() {
                        b"timeout" => {
                            let secs = parse_positive::<u64>("timeout", &text)?;
                            config.default_timeout = Duration::from_secs(secs);
                        }
                        b"user-agent" => config.user_agent = text,
                        b"max-body" => config.max_body_bytes = parse_positive("max-body", &text)?,
                        _ => {}
                    }
                    element_name.clear();
                }
                Ok(Event::End(_)) => element_name.clear(),
                _ => {}
            }
            buf.clear();
        }
        Ok(config)
    }

    /// Serialize to the settings document.
    pub fn to_xml(&self) -> Result<String, SettingsError> {
        let mut out = Vec::new();
        let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("settings")))
            .map_err(xml_err)?;
        let timeout = self.default_timeout.as_secs().to_string();
        let max_body = self.max_body_bytes.to_string();
        for (name, value) in [
            ("timeout", timeout.as_str()),
            ("user-agent", self.user_agent.as_str()),
            ("max-body", max_body.as_str()),
        ] {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("settings")))
            .map_err(xml_err)?;
        String::from_utf8(out).map_err(xml_err)
    }

    /// Write the whole settings document to `path`, creating the directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}

fn xml_err(e: impl std::fmt::Display) -> SettingsError {
    SettingsError::Xml(e.to_string())
}

/// Like `parse_number`, but zero is a value error.
fn parse_positive<T: std::str::FromStr + Default + PartialEq>(element: &str, text: &str) -> Result<T, SettingsError> {
    let value: T = parse_number(element, text)?;
    if value == T::default() {
        return Err(SettingsError::Value {
            element: element.to_string(),
            value: text.to_string(),
        });
    }
    Ok(value)
}

fn parse_number<T: std::str::FromStr>(element: &str, text: &str) -> Result<T, SettingsError> {
    text.parse().map_err(|_| SettingsError::Value {
        element: element.to_string(),
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExecutorConfig::default();
        assert_eq!(c.default_timeout, Duration::from_secs(30));
        assert!(c.user_agent.starts_with("Posterer/"));
    }

    #[test]
    fn xml_roundtrip_preserves_escaped_text() {
        let c = ExecutorConfig {
            default_timeout: Duration::from_secs(7),
            user_agent: "Tester <qa> & co".to_string(),
            max_body_bytes: 1024,
        };
        let xml = c.to_xml().unwrap();
        assert!(xml.contains("&lt;qa&gt;"));
        assert_eq!(ExecutorConfig::from_xml(&xml).unwrap(), c);
    }

    #[test]
    fn unknown_elements_ignored_and_missing_kept_default() {
        let c = ExecutorConfig::from_xml("<settings><colour>blue</colour><timeout>5</timeout></settings>").unwrap();
        assert_eq!(c.default_timeout, Duration::from_secs(5));
        assert_eq!(c.max_body_bytes, DEFAULT_MAX_BODY);
    }

    #[test]
    fn bad_number_is_value_error() {
        let err = ExecutorConfig::from_xml("<settings><timeout>soon</timeout></settings>").unwrap_err();
        assert!(matches!(err, SettingsError::Value { .. }));
    }

    #[test]
    fn missing_file_gives_defaults_and_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.xml");
        assert_eq!(ExecutorConfig::load(&path).unwrap(), ExecutorConfig::default());
        let c = ExecutorConfig {
            default_timeout: Duration::from_secs(12),
            ..ExecutorConfig::default()
        };
        c.save(&path).unwrap();
        assert_eq!(ExecutorConfig::load(&path).unwrap(), c);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ExecutorConfig::from_xml("<settings><timeout>0</timeout></settings>").unwrap_err();
        assert!(
            matches!(err, SettingsError::Value { ref element, ref value } if element == "timeout" && value == "0")
        );
    }

    #[test]
    fn zero_max_body_is_rejected() {
        let err = ExecutorConfig::from_xml("<settings><max-body>0</max-body></settings>").unwrap_err();
        assert!(
            matches!(err, SettingsError::Value { ref element, .. } if element == "max-body")
        );
    }
}
