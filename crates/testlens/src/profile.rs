// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Run profiles
//!
//! A profile is a named set of extra toolchain flags and environment
//! variables. The controller asks an [`ActiveProfileProvider`] for the
//! current profile at the start of every run.
//!
//! Profiles are stored as JSON:
//!
//! ```json
//! {
//!   "active": "race",
//!   "profiles": [
//!     { "name": "race", "flags": ["-race"], "env": { "CGO_ENABLED": "1" } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Name of the built-in profile
pub const DEFAULT_PROFILE: &str = "default";

/// Profile errors
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Reading the profile file failed
    #[error("Failed to read profile file {path}: {source}")]
    Read {
        /// Profile file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The profile file is not valid JSON
    #[error("Invalid profile file {path}: {source}")]
    Parse {
        /// Profile file path
        path: PathBuf,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// A profile was selected that the file does not define
    #[error("Unknown profile '{name}' (available: {available})")]
    UnknownProfile {
        /// Requested name
        name: String,
        /// Comma-separated defined names
        available: String,
    },
}

/// Named flags and environment for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name
    pub name: String,
    /// Extra toolchain flags, placed before the target
    #[serde(default)]
    pub flags: Vec<String>,
    /// Environment variables overlaid on the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Profile {
    /// The built-in profile: no flags, no environment
    #[must_use]
    pub fn builtin() -> Self {
        Self::named(DEFAULT_PROFILE)
    }

    /// An empty profile with a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append flags
    #[must_use]
    pub fn with_flags<I, F>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Add or replace environment variables
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Supplies the profile to use for the next run
pub trait ActiveProfileProvider {
    /// The profile to apply now
    fn active_profile(&self) -> Profile;
}

/// A fixed profile
#[derive(Debug, Clone, Default)]
pub struct StaticProfile(pub Profile);

impl ActiveProfileProvider for StaticProfile {
    fn active_profile(&self) -> Profile {
        self.0.clone()
    }
}

/// Extra flags and environment layered over another provider
#[derive(Debug, Clone)]
pub struct ProfileOverlay<P> {
    inner: P,
    flags: Vec<String>,
    env: Vec<(String, String)>,
}

impl<P: ActiveProfileProvider> ProfileOverlay<P> {
    /// Layer `flags` and `env` over `inner`
    #[must_use]
    pub fn new(inner: P, flags: Vec<String>, env: Vec<(String, String)>) -> Self {
        Self { inner, flags, env }
    }
}

impl<P: ActiveProfileProvider> ActiveProfileProvider for ProfileOverlay<P> {
    fn active_profile(&self) -> Profile {
        self.inner
            .active_profile()
            .with_flags(self.flags.iter().cloned())
            .with_env(self.env.iter().cloned())
    }
}

/// On-disk profile file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFile {
    /// Name of the active profile
    #[serde(default)]
    pub active: Option<String>,
    /// Defined profiles
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Profiles loaded from a JSON file
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    file: ProfileFile,
    selected: Option<String>,
}

impl ProfileStore {
    /// Create a store from already-parsed contents
    #[must_use]
    pub fn from_file(file: ProfileFile) -> Self {
        Self {
            file,
            selected: None,
        }
    }

    /// Load profiles from `path`; a missing file yields an empty store
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Read` if the file exists but cannot be read and
    /// `ProfileError::Parse` if it is not a valid profile file.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No profile file, using built-in profile");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ProfileError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file = serde_json::from_str(&text).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_file(file))
    }

    /// Select a profile by name, overriding the file's `active` entry
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::UnknownProfile` if no such profile exists.
    pub fn select(&mut self, name: &str) -> Result<(), ProfileError> {
        if name != DEFAULT_PROFILE && self.find(name).is_none() {
            return Err(ProfileError::UnknownProfile {
                name: name.to_string(),
                available: self.names().join(", "),
            });
        }
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// Names of all profiles, the built-in one first
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![DEFAULT_PROFILE.to_string()];
        for profile in &self.file.profiles {
            if !names.contains(&profile.name) {
                names.push(profile.name.clone());
            }
        }
        names
    }

    fn find(&self, name: &str) -> Option<&Profile> {
        self.file.profiles.iter().find(|p| p.name == name)
    }
}

impl ActiveProfileProvider for ProfileStore {
    fn active_profile(&self) -> Profile {
        let name = self
            .selected
            .as_deref()
            .or(self.file.active.as_deref())
            .unwrap_or(DEFAULT_PROFILE);
        self.find(name).cloned().unwrap_or_else(|| {
            debug!(profile = name, "Profile not defined, using built-in profile");
            Profile::builtin()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn sample() -> ProfileStore {
        let file: ProfileFile = serde_json::from_str(
            r#"{
                "active": "race",
                "profiles": [
                    { "name": "race", "flags": ["-race"], "env": { "CGO_ENABLED": "1" } },
                    { "name": "short", "flags": ["-short", "-count=1"] }
                ]
            }"#,
        )
        .expect("valid profile file");
        ProfileStore::from_file(file)
    }

    #[test]
    fn test_active_from_file() {
        let profile = sample().active_profile();
        assert_eq!(profile.name, "race");
        assert_eq!(profile.flags, vec!["-race"]);
        assert_eq!(profile.env.get("CGO_ENABLED").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_select_overrides_active() {
        let mut store = sample();
        store.select("short").expect("known profile");
        assert_eq!(store.active_profile().flags, vec!["-short", "-count=1"]);
        assert!(store.active_profile().env.is_empty());
    }

    #[test]
    fn test_select_unknown_profile() {
        let mut store = sample();
        let err = store.select("nope").expect_err("unknown");
        assert!(err.to_string().contains("default, race, short"));
    }

    #[test]
    fn test_missing_file_is_builtin() {
        let store = ProfileStore::load(Path::new("/nonexistent/testlens/profiles.json"))
            .expect("missing file is fine");
        assert_eq!(store.active_profile(), Profile::builtin());
    }

    #[test]
    fn test_overlay_extends_active_profile() {
        let overlay = ProfileOverlay::new(
            StaticProfile(Profile::named("ci").with_flags(["-v"])),
            vec!["-race".to_string()],
            vec![("GOFLAGS".to_string(), "-mod=mod".to_string())],
        );
        let profile = overlay.active_profile();
        assert_eq!(profile.name, "ci");
        assert_eq!(profile.flags, vec!["-v", "-race"]);
        assert_eq!(profile.env.get("GOFLAGS").map(String::as_str), Some("-mod=mod"));
    }
}
