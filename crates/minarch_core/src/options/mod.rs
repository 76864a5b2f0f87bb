//! Typed option lists.
//!
//! One [`OptionList`] mirrors the core's variable schema (filled during the environment handshake), a second one
//! holds the frontend's own settings. Both are persisted through the config cascade.

use itertools::Itertools;

pub use frontend::{FrontendOption, FrontendOptions};

pub mod frontend;

/// Keys whose core supplied description is too cryptic for the menu.
const DISPLAY_NAMES: &[(&str, &str)] = &[("pcsx_rearmed_analog_combo", "DualShock Toggle Combo")];

/// Friendlier menu name for `key`, falling back to `name`.
pub fn display_name<'a>(key: &str, name: &'a str) -> &'a str {
    DISPLAY_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map_or(name, |(_, display)| display)
}

/// A single core option definition (v1 style): a key, a description and a list of `(value, label)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionDefinition {
    pub key: String,
    pub desc: String,
    pub info: Option<String>,
    pub values: Vec<(String, Option<String>)>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreOption {
    pub key: String,
    /// Short name shown in the menu.
    pub name: String,
    /// Long description, when the core provided one.
    pub desc: Option<String>,
    pub values: Vec<String>,
    /// Parallel to `values`.
    pub labels: Vec<String>,
    pub default_index: usize,
    /// Index of the current value.
    pub value: usize,
    /// Set when a config file pinned this option with a leading `-`.
    pub lock: bool,
    pub visible: bool,
}

impl CoreOption {
    /// Build an option from a definition, labels default to their values.
    pub fn from_definition(def: &OptionDefinition) -> Self {
        let values: Vec<String> = def.values.iter().map(|(value, _)| value.clone()).collect();
        let labels = def
            .values
            .iter()
            .map(|(value, label)| label.clone().unwrap_or_else(|| value.clone()))
            .collect();

        let mut option = Self {
            key: def.key.clone(),
            name: display_name(&def.key, &def.desc).to_string(),
            desc: def.info.clone(),
            values,
            labels,
            default_index: 0,
            value: 0,
            lock: false,
            visible: true,
        };

        if let Some(default) = &def.default_value {
            option.default_index = option.value_index(default);
            option.value = option.default_index;
        }

        option
    }

    /// Parse a legacy variable: `"Description; first|second|third"`. The first value is the default.
    ///
    /// Returns `None` for malformed strings (no `;`, or no values).
    pub fn from_variable(key: &str, declaration: &str) -> Option<Self> {
        let (desc, values) = declaration.split_once(';')?;
        let values: Vec<String> = values
            .trim_start()
            .split('|')
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        if values.is_empty() {
            return None;
        }

        Some(Self {
            key: key.to_string(),
            name: display_name(key, desc.trim()).to_string(),
            desc: None,
            labels: values.clone(),
            values,
            default_index: 0,
            value: 0,
            lock: false,
            visible: true,
        })
    }

    /// Index of `value` in this option, `0` when it is not one of the known values.
    pub fn value_index(&self, value: &str) -> usize {
        self.values.iter().position(|v| v == value).unwrap_or(0)
    }

    pub fn current_value(&self) -> Option<&str> {
        self.values.get(self.value).map(String::as_str)
    }

    pub fn current_label(&self) -> Option<&str> {
        self.labels.get(self.value).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionList {
    options: Vec<CoreOption>,
    /// Set on every accepted write, cleared once the core has seen it.
    changed: bool,
}

impl OptionList {
    pub fn new(options: Vec<CoreOption>) -> Self {
        Self {
            options,
            changed: false,
        }
    }

    /// Swap in a new schema, dropping any pending change notification.
    pub fn replace(&mut self, options: Vec<CoreOption>) {
        log::debug!("Option list replaced with {} entries", options.len());
        self.options = options;
        self.changed = false;
    }

    pub fn from_definitions(defs: &[OptionDefinition]) -> Self {
        Self::new(defs.iter().map(CoreOption::from_definition).collect())
    }

    /// Build a list from legacy `(key, "Desc; a|b")` pairs, skipping malformed entries.
    pub fn from_variables<'a>(vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            vars.into_iter()
                .filter_map(|(key, declaration)| {
                    let option = CoreOption::from_variable(key, declaration);
                    if option.is_none() {
                        log::debug!("Skipping malformed variable {}: {:?}", key, declaration);
                    }
                    option
                })
                .collect(),
        )
    }

    pub fn into_options(self) -> Vec<CoreOption> {
        self.options
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn find(&self, key: &str) -> Option<&CoreOption> {
        self.options.iter().find(|o| o.key == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut CoreOption> {
        self.options.iter_mut().find(|o| o.key == key)
    }

    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.find(key).and_then(CoreOption::current_value)
    }

    /// Select `value` for `key`.
    ///
    /// # Returns
    /// * `true` - If the option exists and `value` is one of its values.
    /// * `false` - Otherwise, nothing is changed.
    pub fn set_value(&mut self, key: &str, value: &str) -> bool {
        let Some(option) = self.find_mut(key) else {
            return false;
        };
        let Some(index) = option.values.iter().position(|v| v == value) else {
            return false;
        };

        option.value = index;
        self.changed = true;
        true
    }

    /// Select the value at `index` for `key`, out of range indices are rejected.
    pub fn set_raw_value(&mut self, key: &str, index: usize) -> bool {
        let Some(option) = self.find_mut(key) else {
            return false;
        };
        if index >= option.values.len() {
            return false;
        }

        option.value = index;
        self.changed = true;
        true
    }

    pub fn set_visible(&mut self, key: &str, visible: bool) -> bool {
        match self.find_mut(key) {
            Some(option) => {
                option.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_lock(&mut self, key: &str, lock: bool) {
        if let Some(option) = self.find_mut(key) {
            option.lock = lock;
        }
    }

    /// Report whether anything changed since the last call, and clear the flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Put every option back on its default and unlock it.
    pub fn reset_defaults(&mut self) {
        for option in &mut self.options {
            option.value = option.default_index;
            option.lock = false;
        }
    }

    /// `key = value` lines in declaration order, as written to config files.
    pub fn config_lines(&self) -> String {
        self.options
            .iter()
            .filter_map(|o| o.current_value().map(|v| format!("{} = {}\n", o.key, v)))
            .join("")
    }
}
