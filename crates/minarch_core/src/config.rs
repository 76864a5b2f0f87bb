//! The `key = value` config cascade.
//!
//! Three levels are read in order: the platform `system.cfg`, the console `default.cfg` shipped with the emulator,
//! and one user file (game override if present, else the console file). Later levels win.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::input::{Binding, ControlMapping, Controls};
use crate::options::OptionList;

pub const GAMEPAD_TYPE_KEY: &str = "minarch_gamepad_type";
const BIND_PREFIX: &str = "bind ";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not write config file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    /// Any occurrence of the key carried a leading `-`.
    pub lock: bool,
}

/// The parsed contents of one config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigValues {
    entries: Vec<ConfigEntry>,
}

impl ConfigValues {
    /// Parse `key = value` lines. Malformed lines are skipped, the last occurrence of a key provides its value.
    pub fn parse(text: &str) -> Self {
        let mut values = Self::default();

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let (key, lock) = match key.strip_prefix('-') {
                Some(key) => (key.trim_start(), true),
                None => (key, false),
            };
            if key.is_empty() {
                continue;
            }

            values.insert(key, value.trim(), lock);
        }

        values
    }

    fn insert(&mut self, key: &str, value: &str, lock: bool) {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.value = value.to_string();
                entry.lock |= lock;
            }
            None => self.entries.push(ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
                lock,
            }),
        }
    }

    /// Read and parse `path`, `Ok(None)` when it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, label)` pairs of every `bind name = label` line.
    pub fn bind_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.key.strip_prefix(BIND_PREFIX).map(|name| (name, e.value.as_str())))
    }
}

/// Which user file is currently providing settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigLevel {
    #[default]
    Defaults,
    Console,
    Game,
}

impl ConfigLevel {
    pub fn description(self) -> &'static str {
        match self {
            ConfigLevel::Defaults => "Using defaults.",
            ConfigLevel::Console => "Using console config.",
            ConfigLevel::Game => "Using game config.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScope {
    Console,
    Game,
}

/// Where the cascade files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Holds `system.cfg`.
    pub system_dir: PathBuf,
    /// The emulator's shipped directory, holds `default.cfg`.
    pub emu_dir: PathBuf,
    /// Per core user directory, holds `minarch.cfg` and game overrides.
    pub config_dir: PathBuf,
    pub game_name: String,
    /// Device tag, selects `-{device}` file variants.
    pub device: Option<String>,
}

impl ConfigPaths {
    fn suffix(&self) -> String {
        match &self.device {
            Some(device) if !device.is_empty() => format!("-{}", device),
            _ => String::new(),
        }
    }

    /// `{dir}/{stem}-{device}.cfg` when it exists, else `{dir}/{stem}.cfg`.
    fn shipped_file(&self, dir: &Path, stem: &str) -> PathBuf {
        let suffix = self.suffix();
        if !suffix.is_empty() {
            let variant = dir.join(format!("{}{}.cfg", stem, suffix));
            if variant.exists() {
                log::info!("Using device config: {}", variant.display());
                return variant;
            }
        }
        dir.join(format!("{}.cfg", stem))
    }

    pub fn system_file(&self) -> PathBuf {
        self.shipped_file(&self.system_dir, "system")
    }

    pub fn default_file(&self) -> PathBuf {
        self.shipped_file(&self.emu_dir, "default")
    }

    /// The user file for `scope`, an empty game name falls back to the console file.
    pub fn user_file(&self, scope: WriteScope) -> PathBuf {
        let suffix = self.suffix();
        match scope {
            WriteScope::Game if !self.game_name.is_empty() => {
                self.config_dir.join(format!("{}{}.cfg", self.game_name, suffix))
            }
            _ => self.config_dir.join(format!("minarch{}.cfg", suffix)),
        }
    }
}

/// A loaded cascade.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: ConfigPaths,
    system: Option<ConfigValues>,
    defaults: Option<ConfigValues>,
    user: Option<ConfigValues>,
    loaded: ConfigLevel,
}

impl Config {
    pub fn load(paths: ConfigPaths) -> Result<Self, ConfigError> {
        let mut config = Self {
            paths,
            system: None,
            defaults: None,
            user: None,
            loaded: ConfigLevel::Defaults,
        };
        config.reload()?;
        Ok(config)
    }

    /// Re-read every level from disk.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.system = ConfigValues::read(&self.paths.system_file())?;
        self.defaults = ConfigValues::read(&self.paths.default_file())?;

        let game = self.paths.user_file(WriteScope::Game);
        let (path, level) = if !self.paths.game_name.is_empty() && game.exists() {
            (game, ConfigLevel::Game)
        } else {
            (self.paths.user_file(WriteScope::Console), ConfigLevel::Console)
        };

        self.user = ConfigValues::read(&path)?;
        self.loaded = if self.user.is_some() {
            log::info!("Loaded user config: {}", path.display());
            level
        } else {
            ConfigLevel::Defaults
        };

        Ok(())
    }

    pub fn loaded(&self) -> ConfigLevel {
        self.loaded
    }

    fn option_levels(&self) -> impl Iterator<Item = &ConfigValues> {
        [&self.system, &self.defaults, &self.user].into_iter().flatten()
    }

    fn control_levels(&self) -> impl Iterator<Item = &ConfigValues> {
        [&self.defaults, &self.user].into_iter().flatten()
    }

    /// Merged view of one key over all option levels.
    pub fn entry(&self, key: &str) -> Option<ConfigEntry> {
        self.option_levels().fold(None, |merged: Option<ConfigEntry>, level| match level.get(key) {
            Some(entry) => Some(ConfigEntry {
                key: entry.key.clone(),
                value: entry.value.clone(),
                lock: entry.lock || merged.map_or(false, |m| m.lock),
            }),
            None => merged,
        })
    }

    /// Push every configured value into `list`, level by level. Locks accumulate.
    pub fn apply_options(&self, list: &mut OptionList) {
        let keys: Vec<String> = list.iter().map(|o| o.key.clone()).collect();

        for level in self.option_levels() {
            for key in &keys {
                let Some(entry) = level.get(key) else {
                    continue;
                };
                if !list.set_value(key, &entry.value) {
                    log::debug!("Ignoring unknown value {:?} for {}", entry.value, key);
                }
                if entry.lock {
                    list.set_lock(key, true);
                }
            }
        }
    }

    /// The configured gamepad type index, if any level sets one.
    pub fn gamepad_type(&self) -> Option<usize> {
        self.entry(GAMEPAD_TYPE_KEY).and_then(|e| e.value.parse().ok())
    }

    /// Bindings shipped in `default.cfg` with their retro buttons, for cores without a standard layout.
    pub fn core_controls(&self) -> Option<Vec<ControlMapping>> {
        self.defaults
            .as_ref()
            .and_then(|defaults| Controls::from_bind_entries(defaults.bind_entries()))
    }

    /// Apply `bind` lines from the console defaults and the user file.
    pub fn apply_controls(&self, controls: &mut Controls) {
        for level in self.control_levels() {
            for (name, value) in level.bind_entries() {
                // A `:retro` suffix only matters to `core_controls`.
                let label = value.rsplit_once(':').map_or(value, |(label, _)| label);
                let binding = Binding::from_label(label).unwrap_or_default();

                if controls.set_control(name, binding) {
                    continue;
                }
                if let Some((shortcut, _)) = controls.shortcuts.iter().find(|(s, _)| s.name() == name).copied() {
                    controls.set_shortcut(shortcut, binding);
                }
            }
        }
    }

    /// Persist the current settings for `scope`.
    ///
    /// Saving for the whole console while a game override is loaded deletes the override.
    pub fn write(
        &mut self,
        scope: WriteScope,
        frontend: &OptionList,
        core: &OptionList,
        gamepad_type: Option<usize>,
        controls: &Controls,
    ) -> Result<PathBuf, ConfigError> {
        if scope == WriteScope::Console && self.loaded == ConfigLevel::Game {
            let game = self.paths.user_file(WriteScope::Game);
            if let Err(e) = std::fs::remove_file(&game) {
                log::warn!("Could not remove game config {}: {}", game.display(), e);
            }
        }

        let path = self.paths.user_file(scope);
        let mut text = frontend.config_lines();
        text.push_str(&core.config_lines());
        if let Some(gamepad_type) = gamepad_type {
            text.push_str(&format!("{} = {}\n", GAMEPAD_TYPE_KEY, gamepad_type));
        }
        for control in &controls.controls {
            text.push_str(&format!("{}{} = {}\n", BIND_PREFIX, control.name, control.binding.label()));
        }
        for (shortcut, binding) in &controls.shortcuts {
            text.push_str(&format!("{}{} = {}\n", BIND_PREFIX, shortcut.name(), binding.label()));
        }

        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.paths.config_dir).map_err(write_err)?;
        let mut file = File::create(&path).map_err(write_err)?;
        file.write_all(text.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        self.user = Some(ConfigValues::parse(&text));
        self.loaded = match scope {
            WriteScope::Game if !self.paths.game_name.is_empty() => ConfigLevel::Game,
            _ => ConfigLevel::Console,
        };
        log::info!("Saved config: {}", path.display());

        Ok(path)
    }

    /// Delete the loaded user file, reset everything to defaults and re-read the cascade.
    pub fn restore(
        &mut self,
        frontend: &mut OptionList,
        core: &mut OptionList,
        controls: &mut Controls,
    ) -> Result<(), ConfigError> {
        let scope = match self.loaded {
            ConfigLevel::Game => Some(WriteScope::Game),
            ConfigLevel::Console => Some(WriteScope::Console),
            ConfigLevel::Defaults => None,
        };
        if let Some(scope) = scope {
            let path = self.paths.user_file(scope);
            match std::fs::remove_file(&path) {
                Ok(()) => log::info!("Deleted config: {}", path.display()),
                Err(e) => log::warn!("Could not delete config {}: {}", path.display(), e),
            }
        }
        self.loaded = ConfigLevel::Defaults;

        frontend.reset_defaults();
        core.reset_defaults();
        core.mark_changed();
        controls.reset_defaults();

        self.reload()?;
        self.apply_options(frontend);
        self.apply_options(core);
        self.apply_controls(controls);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Shortcut;
    use crate::options::{CoreOption, FrontendOptions};
    use crate::pad::Button;

    fn vsync_list() -> OptionList {
        OptionList::new(vec![CoreOption::from_variable("vsync", "VSync; on|off").unwrap()])
    }

    fn paths(root: &Path, game: &str, device: Option<&str>) -> ConfigPaths {
        ConfigPaths {
            system_dir: root.join("system"),
            emu_dir: root.join("emu"),
            config_dir: root.join("userdata"),
            game_name: game.to_string(),
            device: device.map(str::to_string),
        }
    }

    fn write_file(path: PathBuf, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_parse_lines() {
        let values = ConfigValues::parse("a = 1\r\n-b = two words\nno separator\n = orphan\nbind Up = MENU+UP\n");

        assert_eq!(values.value("a"), Some("1"));
        assert_eq!(values.get("b").unwrap().lock, true);
        assert_eq!(values.value("b"), Some("two words"));
        assert_eq!(values.len(), 3);
        assert_eq!(values.bind_entries().collect::<Vec<_>>(), vec![("Up", "MENU+UP")]);
    }

    #[test]
    fn test_last_occurrence_wins_and_lock_sticks() {
        let values = ConfigValues::parse("-x = 1\nx = 2\n");
        let entry = values.get("x").unwrap();

        assert_eq!(entry.value, "2");
        assert!(entry.lock);
    }

    #[test]
    fn test_cascade_lock_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path(), "", None);
        write_file(paths.system_file(), "vsync = on\n");
        write_file(paths.user_file(WriteScope::Console), "-vsync = off\n");

        let config = Config::load(paths).unwrap();
        let mut list = vsync_list();
        config.apply_options(&mut list);

        let vsync = list.find("vsync").unwrap();
        assert_eq!(vsync.current_value(), Some("off"));
        assert!(vsync.lock);
        assert_eq!(config.loaded(), ConfigLevel::Console);
        assert_eq!(config.loaded().description(), "Using console config.");
    }

    #[test]
    fn test_device_variant_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path(), "", Some("rg35xx"));
        write_file(dir.path().join("system/system.cfg"), "vsync = on\n");
        write_file(dir.path().join("system/system-rg35xx.cfg"), "vsync = off\n");

        let config = Config::load(paths).unwrap();
        let mut list = vsync_list();
        config.apply_options(&mut list);

        assert_eq!(list.get_value("vsync"), Some("off"));
        assert_eq!(config.loaded(), ConfigLevel::Defaults);
    }

    #[test]
    fn test_game_override_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path(), "Tetris", None);
        write_file(paths.user_file(WriteScope::Console), "vsync = on\n");
        write_file(paths.user_file(WriteScope::Game), "vsync = off\n");

        let config = Config::load(paths).unwrap();
        let mut list = vsync_list();
        config.apply_options(&mut list);

        assert_eq!(config.loaded(), ConfigLevel::Game);
        assert_eq!(list.get_value("vsync"), Some("off"));
    }

    #[test]
    fn test_write_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load(paths(dir.path(), "Tetris", None)).unwrap();

        let mut frontend = FrontendOptions::new();
        frontend.list.set_value("minarch_screen_effect", "Grid");
        let mut core = vsync_list();
        core.set_value("vsync", "off");
        let mut controls = Controls::default();
        controls.set_control("A Button", Binding::with_menu(Button::B));
        controls.set_shortcut(Shortcut::SaveState, Binding::new(Button::L2));

        let path = config
            .write(WriteScope::Game, &frontend.list, &core, Some(1), &controls)
            .unwrap();
        assert!(path.ends_with("userdata/Tetris.cfg"));
        assert_eq!(config.loaded(), ConfigLevel::Game);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("minarch_screen_effect = Grid\n"));
        assert!(text.contains("vsync = off\n"));
        assert!(text.contains("minarch_gamepad_type = 1\n"));
        assert!(text.contains("bind A Button = MENU+B\n"));
        assert!(text.contains("bind Save State = L2\n"));

        let reloaded = Config::load(config.paths.clone()).unwrap();
        let mut fresh = Controls::default();
        reloaded.apply_controls(&mut fresh);
        assert_eq!(fresh.find_control("A Button").unwrap().binding, Binding::with_menu(Button::B));
        assert_eq!(fresh.shortcut(Shortcut::SaveState), Binding::new(Button::L2));
        assert_eq!(reloaded.gamepad_type(), Some(1));
    }

    #[test]
    fn test_console_write_removes_game_override() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path(), "Tetris", None);
        write_file(paths.user_file(WriteScope::Game), "vsync = off\n");
        let mut config = Config::load(paths.clone()).unwrap();

        let frontend = FrontendOptions::new();
        config
            .write(WriteScope::Console, &frontend.list, &vsync_list(), None, &Controls::default())
            .unwrap();

        assert!(!paths.user_file(WriteScope::Game).exists());
        assert!(paths.user_file(WriteScope::Console).exists());
        assert_eq!(config.loaded(), ConfigLevel::Console);
    }

    #[test]
    fn test_restore_resets_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path(), "", None);
        write_file(paths.default_file(), "vsync = off\n");
        write_file(paths.user_file(WriteScope::Console), "vsync = on\nbind B Button = A\n");

        let mut config = Config::load(paths.clone()).unwrap();
        let mut frontend = FrontendOptions::new();
        let mut core = vsync_list();
        let mut controls = Controls::default();
        config.apply_options(&mut core);
        config.apply_controls(&mut controls);
        assert_eq!(core.get_value("vsync"), Some("on"));
        core.take_changed();

        config.restore(&mut frontend.list, &mut core, &mut controls).unwrap();

        assert!(!paths.user_file(WriteScope::Console).exists());
        assert_eq!(config.loaded(), ConfigLevel::Defaults);
        assert_eq!(core.get_value("vsync"), Some("off"));
        assert!(core.take_changed());
        assert_eq!(controls.find_control("B Button").unwrap().binding, Binding::new(Button::B));
    }

    #[test]
    fn test_core_controls_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path(), "", None);
        write_file(paths.default_file(), "bind Fire = A:B\nbind Pause = START\n");

        let config = Config::load(paths).unwrap();
        let controls = config.core_controls().unwrap();
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0].name, "Fire");
    }
}
