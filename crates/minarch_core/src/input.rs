//! Mapping between device buttons and the libretro joypad.
//!
//! A [`Controls`] set holds the game controls (device button -> retro button) and the frontend shortcuts. Each poll
//! it turns the current [`PadState`] into the button mask handed to the core.

use crate::pad::{Button, PadState};

/// Libretro joypad ids and device classes.
pub mod retro {
    pub const DEVICE_JOYPAD: u32 = 1;
    pub const DEVICE_ANALOG: u32 = 5;

    pub const JOYPAD_B: u32 = 0;
    pub const JOYPAD_Y: u32 = 1;
    pub const JOYPAD_SELECT: u32 = 2;
    pub const JOYPAD_START: u32 = 3;
    pub const JOYPAD_UP: u32 = 4;
    pub const JOYPAD_DOWN: u32 = 5;
    pub const JOYPAD_LEFT: u32 = 6;
    pub const JOYPAD_RIGHT: u32 = 7;
    pub const JOYPAD_A: u32 = 8;
    pub const JOYPAD_X: u32 = 9;
    pub const JOYPAD_L: u32 = 10;
    pub const JOYPAD_R: u32 = 11;
    pub const JOYPAD_L2: u32 = 12;
    pub const JOYPAD_R2: u32 = 13;
    pub const JOYPAD_L3: u32 = 14;
    pub const JOYPAD_R3: u32 = 15;
    /// Query for the whole button mask at once.
    pub const JOYPAD_MASK: u32 = 256;

    pub const ANALOG_LEFT: u32 = 0;
    pub const ANALOG_RIGHT: u32 = 1;
    pub const ANALOG_X: u32 = 0;
    pub const ANALOG_Y: u32 = 1;

    /// Joypad ids a core can describe.
    pub const BUTTON_COUNT: u32 = 16;
}

/// Number of bindable device buttons, `MENU+` labels are offset by this.
pub const LOCAL_BUTTON_COUNT: usize = 16;

/// Labels used in `bind` config lines, index `i + 1` is device button `i`.
pub const BUTTON_LABELS: [&str; 1 + 2 * LOCAL_BUTTON_COUNT] = [
    "NONE", "UP", "DOWN", "LEFT", "RIGHT", "A", "B", "X", "Y", "START", "SELECT", "L1", "R1", "L2", "R2", "L3", "R3",
    "MENU+UP", "MENU+DOWN", "MENU+LEFT", "MENU+RIGHT", "MENU+A", "MENU+B", "MENU+X", "MENU+Y", "MENU+START",
    "MENU+SELECT", "MENU+L1", "MENU+R1", "MENU+L2", "MENU+R2", "MENU+L3", "MENU+R3",
];

/// Gamepad types offered to cores that declare custom controllers, with their libretro device ids.
pub const GAMEPAD_LABELS: [&str; 2] = ["Standard", "DualShock"];
pub const GAMEPAD_DEVICES: [u32; 2] = [1, 517];

/// A device button, optionally combined with MENU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Binding {
    pub button: Option<Button>,
    pub modifier: bool,
}

impl Binding {
    pub const NONE: Binding = Binding {
        button: None,
        modifier: false,
    };

    pub fn new(button: Button) -> Self {
        Self {
            button: Some(button),
            modifier: false,
        }
    }

    pub fn with_menu(button: Button) -> Self {
        Self {
            button: Some(button),
            modifier: true,
        }
    }

    /// Parse a label from [`BUTTON_LABELS`].
    pub fn from_label(label: &str) -> Option<Self> {
        let index = BUTTON_LABELS.iter().position(|l| *l == label)?;
        if index == 0 {
            return Some(Self::NONE);
        }

        let id = index - 1;
        let (id, modifier) = if id >= LOCAL_BUTTON_COUNT {
            (id - LOCAL_BUTTON_COUNT, true)
        } else {
            (id, false)
        };

        Button::from_id(id).map(|button| Self {
            button: Some(button),
            modifier,
        })
    }

    pub fn label(&self) -> &'static str {
        match self.button {
            Some(button) if button.id() < LOCAL_BUTTON_COUNT => {
                let offset = if self.modifier { LOCAL_BUTTON_COUNT } else { 0 };
                BUTTON_LABELS[1 + offset + button.id()]
            }
            _ => BUTTON_LABELS[0],
        }
    }

    /// Whether this binding is held right now.
    fn is_held(&self, pad: &PadState) -> bool {
        match self.button {
            Some(button) => pad.is_pressed(button) && (!self.modifier || pad.is_pressed(Button::Menu)),
            None => false,
        }
    }

    fn active(&self, pad: &PadState) -> bool {
        self.button.is_some() && (!self.modifier || pad.is_pressed(Button::Menu))
    }
}

/// Retro joypad id for a plain label (`"A"`, `"L1"`, ...), used by the `:{retro}` suffix in shipped binding files.
pub fn retro_id_for_label(label: &str) -> Option<u32> {
    let id = match label {
        "UP" => retro::JOYPAD_UP,
        "DOWN" => retro::JOYPAD_DOWN,
        "LEFT" => retro::JOYPAD_LEFT,
        "RIGHT" => retro::JOYPAD_RIGHT,
        "A" => retro::JOYPAD_A,
        "B" => retro::JOYPAD_B,
        "X" => retro::JOYPAD_X,
        "Y" => retro::JOYPAD_Y,
        "START" => retro::JOYPAD_START,
        "SELECT" => retro::JOYPAD_SELECT,
        "L1" => retro::JOYPAD_L,
        "R1" => retro::JOYPAD_R,
        "L2" => retro::JOYPAD_L2,
        "R2" => retro::JOYPAD_R2,
        "L3" => retro::JOYPAD_L3,
        "R3" => retro::JOYPAD_R3,
        _ => return None,
    };
    Some(id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMapping {
    pub name: String,
    pub retro_id: u32,
    pub binding: Binding,
    pub default_binding: Binding,
    /// The core did not list this button in its input descriptors.
    pub ignore: bool,
}

impl ControlMapping {
    fn new(name: &str, retro_id: u32, button: Button) -> Self {
        Self {
            name: name.to_string(),
            retro_id,
            binding: Binding::new(button),
            default_binding: Binding::new(button),
            ignore: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    SaveState,
    LoadState,
    ResetGame,
    SaveQuit,
    CycleScaling,
    CycleEffect,
    ToggleFastForward,
    HoldFastForward,
}

impl Shortcut {
    /// Toggle must come before hold, a toggled fast-forward ignores the hold button's release.
    pub const ALL: [Shortcut; 8] = [
        Shortcut::SaveState,
        Shortcut::LoadState,
        Shortcut::ResetGame,
        Shortcut::SaveQuit,
        Shortcut::CycleScaling,
        Shortcut::CycleEffect,
        Shortcut::ToggleFastForward,
        Shortcut::HoldFastForward,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Shortcut::SaveState => "Save State",
            Shortcut::LoadState => "Load State",
            Shortcut::ResetGame => "Reset Game",
            Shortcut::SaveQuit => "Save & Quit",
            Shortcut::CycleScaling => "Cycle Scaling",
            Shortcut::CycleEffect => "Cycle Effect",
            Shortcut::ToggleFastForward => "Toggle FF",
            Shortcut::HoldFastForward => "Hold FF",
        }
    }
}

/// Things the runner should do in response to shortcuts fired this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    SaveState,
    LoadState,
    ResetGame,
    SaveQuit,
    CycleScaling,
    CycleEffect,
    SetFastForward(bool),
}

/// Fast-forward state shared between the toggle and hold shortcuts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FastForward {
    pub active: bool,
    /// Turned on by the toggle, so releasing the hold button must not turn it off.
    pub toggled_on: bool,
}

/// One entry of the core's `SET_INPUT_DESCRIPTORS` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    pub id: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub controls: Vec<ControlMapping>,
    pub shortcuts: Vec<(Shortcut, Binding)>,
    /// Set once the core described its buttons, later descriptor calls are ignored.
    described: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self::with_controls(Self::default_controls())
    }
}

impl Controls {
    pub fn with_controls(controls: Vec<ControlMapping>) -> Self {
        Self {
            controls,
            shortcuts: Shortcut::ALL.iter().map(|s| (*s, Binding::NONE)).collect(),
            described: false,
        }
    }

    /// One device button per retro button.
    pub fn default_controls() -> Vec<ControlMapping> {
        vec![
            ControlMapping::new("Up", retro::JOYPAD_UP, Button::Up),
            ControlMapping::new("Down", retro::JOYPAD_DOWN, Button::Down),
            ControlMapping::new("Left", retro::JOYPAD_LEFT, Button::Left),
            ControlMapping::new("Right", retro::JOYPAD_RIGHT, Button::Right),
            ControlMapping::new("A Button", retro::JOYPAD_A, Button::A),
            ControlMapping::new("B Button", retro::JOYPAD_B, Button::B),
            ControlMapping::new("X Button", retro::JOYPAD_X, Button::X),
            ControlMapping::new("Y Button", retro::JOYPAD_Y, Button::Y),
            ControlMapping::new("Start", retro::JOYPAD_START, Button::Start),
            ControlMapping::new("Select", retro::JOYPAD_SELECT, Button::Select),
            ControlMapping::new("L1 Button", retro::JOYPAD_L, Button::L1),
            ControlMapping::new("R1 Button", retro::JOYPAD_R, Button::R1),
            ControlMapping::new("L2 Button", retro::JOYPAD_L2, Button::L2),
            ControlMapping::new("R2 Button", retro::JOYPAD_R2, Button::R2),
            ControlMapping::new("L3 Button", retro::JOYPAD_L3, Button::L3),
            ControlMapping::new("R3 Button", retro::JOYPAD_R3, Button::R3),
        ]
    }

    /// Build controls from shipped `bind Name = LABEL[:RETRO]` entries.
    ///
    /// The retro button comes from the suffix when present, else from the label itself. Entries resolving to neither
    /// are skipped.
    pub fn from_bind_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Option<Vec<ControlMapping>> {
        let controls: Vec<ControlMapping> = entries
            .into_iter()
            .filter_map(|(name, value)| {
                let (label, retro_name) = match value.rsplit_once(':') {
                    Some((label, retro_name)) => (label, Some(retro_name)),
                    None => (value, None),
                };
                let binding = Binding::from_label(label).unwrap_or_default();
                let retro_id = retro_name.and_then(retro_id_for_label).or_else(|| retro_id_for_label(label));

                log::debug!("\tbind {} ({}) {:?}:{:?}", name, value, binding.button, retro_id);

                retro_id.map(|retro_id| ControlMapping {
                    name: name.to_string(),
                    retro_id,
                    binding,
                    default_binding: binding,
                    ignore: false,
                })
            })
            .collect();

        (!controls.is_empty()).then_some(controls)
    }

    /// Apply the core's input descriptors: rename controls after what the core calls them and ignore buttons the
    /// core does not use. Only the first call has an effect.
    pub fn apply_descriptors(&mut self, descriptors: &[InputDescriptor]) {
        if self.described {
            return;
        }
        self.described = true;

        let joypad = descriptors
            .iter()
            .filter(|d| d.port == 0 && d.device == retro::DEVICE_JOYPAD && d.index == 0)
            .filter(|d| {
                if d.id >= retro::BUTTON_COUNT {
                    log::debug!("UNAVAILABLE: {}", d.description);
                    false
                } else {
                    log::debug!("PRESENT    : {}", d.description);
                    true
                }
            });

        let mut names: [Option<&str>; retro::BUTTON_COUNT as usize] = Default::default();
        for descriptor in joypad {
            names[descriptor.id as usize] = Some(descriptor.description.as_str());
        }

        for mapping in &mut self.controls {
            match names.get(mapping.retro_id as usize).copied().flatten() {
                Some(name) => mapping.name = name.to_string(),
                None => mapping.ignore = true,
            }
        }
    }

    pub fn find_control(&self, name: &str) -> Option<&ControlMapping> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn set_control(&mut self, name: &str, binding: Binding) -> bool {
        match self.controls.iter_mut().find(|c| c.name == name) {
            Some(control) => {
                control.binding = binding;
                true
            }
            None => false,
        }
    }

    pub fn shortcut(&self, shortcut: Shortcut) -> Binding {
        self.shortcuts
            .iter()
            .find(|(s, _)| *s == shortcut)
            .map_or(Binding::NONE, |(_, b)| *b)
    }

    pub fn set_shortcut(&mut self, shortcut: Shortcut, binding: Binding) {
        if let Some(entry) = self.shortcuts.iter_mut().find(|(s, _)| *s == shortcut) {
            entry.1 = binding;
        }
    }

    /// Every control back to its default, every shortcut unbound.
    pub fn reset_defaults(&mut self) {
        for control in &mut self.controls {
            control.binding = control.default_binding;
        }
        for (_, binding) in &mut self.shortcuts {
            *binding = Binding::NONE;
        }
    }

    /// The retro button mask for the current pad state.
    ///
    /// Suppresses the menu tap on `pad` when a `MENU+` binding contributed.
    pub fn collect_buttons(&self, pad: &mut PadState) -> u32 {
        let mut buttons = 0;
        let mut used_modifier = false;

        for control in self.controls.iter().filter(|c| !c.ignore) {
            if control.binding.is_held(pad) {
                buttons |= 1 << control.retro_id;
                used_modifier |= control.binding.modifier;
            }
        }

        if used_modifier {
            pad.suppress_menu_tap();
        }

        buttons
    }

    /// Evaluate the shortcuts for this poll and update `ff`.
    pub fn poll_shortcuts(&self, pad: &mut PadState, ff: &mut FastForward) -> Vec<ShortcutAction> {
        let mut actions = Vec::new();

        for &(shortcut, binding) in &self.shortcuts {
            let Some(button) = binding.button else {
                continue;
            };
            if !binding.active(pad) {
                continue;
            }

            match shortcut {
                Shortcut::ToggleFastForward => {
                    if pad.just_pressed(button) {
                        ff.active = !ff.active;
                        ff.toggled_on = ff.active;
                        actions.push(ShortcutAction::SetFastForward(ff.active));
                    } else if !pad.just_released(button) {
                        continue;
                    }
                    if binding.modifier {
                        pad.suppress_menu_tap();
                    }
                    break;
                }
                Shortcut::HoldFastForward => {
                    if pad.just_pressed(button) || (!ff.toggled_on && pad.just_released(button)) {
                        ff.active = pad.is_pressed(button);
                        actions.push(ShortcutAction::SetFastForward(ff.active));
                        if binding.modifier {
                            pad.suppress_menu_tap();
                        }
                    }
                }
                _ if pad.just_pressed(button) => {
                    actions.push(match shortcut {
                        Shortcut::SaveState => ShortcutAction::SaveState,
                        Shortcut::LoadState => ShortcutAction::LoadState,
                        Shortcut::ResetGame => ShortcutAction::ResetGame,
                        Shortcut::SaveQuit => ShortcutAction::SaveQuit,
                        Shortcut::CycleScaling => ShortcutAction::CycleScaling,
                        _ => ShortcutAction::CycleEffect,
                    });
                    if binding.modifier {
                        pad.suppress_menu_tap();
                    }
                }
                _ => {}
            }
        }

        actions
    }
}

/// Answer a core's `input_state` query.
pub fn input_state(buttons: u32, pad: &PadState, port: u32, device: u32, index: u32, id: u32) -> i16 {
    if port != 0 {
        return 0;
    }

    match device {
        retro::DEVICE_JOYPAD if index == 0 => {
            if id == retro::JOYPAD_MASK {
                buttons as i16
            } else if id < 32 {
                ((buttons >> id) & 1) as i16
            } else {
                0
            }
        }
        retro::DEVICE_ANALOG => {
            let axis = match index {
                retro::ANALOG_LEFT => pad.left_stick,
                retro::ANALOG_RIGHT => pad.right_stick,
                _ => return 0,
            };
            match id {
                retro::ANALOG_X => axis.x,
                retro::ANALOG_Y => axis.y,
                _ => 0,
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(pad: &mut PadState, button: Button, now: u32) {
        pad.update_button(button, true, now);
    }

    #[test]
    fn test_labels_round_trip() {
        for label in BUTTON_LABELS {
            let binding = Binding::from_label(label).unwrap();
            assert_eq!(binding.label(), label);
        }

        assert_eq!(Binding::from_label("MENU+A"), Some(Binding::with_menu(Button::A)));
        assert_eq!(Binding::from_label("TURBO"), None);
    }

    #[test]
    fn test_default_mask() {
        let controls = Controls::default();
        let mut pad = PadState::new();
        press(&mut pad, Button::A, 0);
        press(&mut pad, Button::Up, 0);

        let mask = controls.collect_buttons(&mut pad);
        assert_eq!(mask, (1 << retro::JOYPAD_A) | (1 << retro::JOYPAD_UP));
        assert_eq!(input_state(mask, &pad, 0, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_A), 1);
        assert_eq!(input_state(mask, &pad, 0, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_B), 0);
        assert_eq!(input_state(mask, &pad, 0, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_MASK), mask as i16);
        assert_eq!(input_state(mask, &pad, 1, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_A), 0);
    }

    #[test]
    fn test_modifier_binding_requires_menu_and_kills_tap() {
        let mut controls = Controls::default();
        controls.set_control("X Button", Binding::with_menu(Button::Y));

        let mut pad = PadState::new();
        press(&mut pad, Button::Y, 0);
        let mask = controls.collect_buttons(&mut pad);
        assert_eq!(mask & (1 << retro::JOYPAD_X), 0);
        assert_ne!(mask & (1 << retro::JOYPAD_Y), 0);

        pad.begin_poll();
        press(&mut pad, Button::Menu, 10);
        assert!(!pad.tapped_menu(10));
        let mask = controls.collect_buttons(&mut pad);
        assert_ne!(mask & (1 << retro::JOYPAD_X), 0);

        pad.begin_poll();
        pad.update_button(Button::Menu, false, 50);
        assert!(!pad.tapped_menu(50));
    }

    #[test]
    fn test_descriptors_rename_and_ignore() {
        let mut controls = Controls::default();
        let descriptors = vec![
            InputDescriptor {
                port: 0,
                device: retro::DEVICE_JOYPAD,
                index: 0,
                id: retro::JOYPAD_A,
                description: "Jump".into(),
            },
            InputDescriptor {
                port: 1,
                device: retro::DEVICE_JOYPAD,
                index: 0,
                id: retro::JOYPAD_B,
                description: "Player 2 B".into(),
            },
        ];
        controls.apply_descriptors(&descriptors);

        let jump = controls.find_control("Jump").unwrap();
        assert!(!jump.ignore);
        assert!(controls.controls.iter().filter(|c| c.retro_id != retro::JOYPAD_A).all(|c| c.ignore));

        let mut pad = PadState::new();
        press(&mut pad, Button::B, 0);
        assert_eq!(controls.collect_buttons(&mut pad), 0);
    }

    #[test]
    fn test_bind_entries_with_retro_suffix() {
        let controls = Controls::from_bind_entries([("Fire", "A:B"), ("Start", "START"), ("Bogus", "NONE")]).unwrap();

        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0].retro_id, retro::JOYPAD_B);
        assert_eq!(controls[0].binding, Binding::new(Button::A));
        assert_eq!(controls[1].retro_id, retro::JOYPAD_START);
        assert!(Controls::from_bind_entries([("Bogus", "NONE")]).is_none());
    }

    #[test]
    fn test_shortcuts_fire_on_press() {
        let mut controls = Controls::default();
        controls.set_shortcut(Shortcut::SaveState, Binding::with_menu(Button::R1));
        let mut ff = FastForward::default();

        let mut pad = PadState::new();
        press(&mut pad, Button::R1, 0);
        assert!(controls.poll_shortcuts(&mut pad, &mut ff).is_empty());

        pad.begin_poll();
        pad.update_button(Button::R1, false, 10);
        pad.begin_poll();
        press(&mut pad, Button::Menu, 20);
        press(&mut pad, Button::R1, 20);
        assert_eq!(controls.poll_shortcuts(&mut pad, &mut ff), vec![ShortcutAction::SaveState]);
    }

    #[test]
    fn test_toggle_survives_hold_release() {
        let mut controls = Controls::default();
        controls.set_shortcut(Shortcut::ToggleFastForward, Binding::new(Button::L2));
        controls.set_shortcut(Shortcut::HoldFastForward, Binding::new(Button::R2));
        let mut ff = FastForward::default();
        let mut pad = PadState::new();

        press(&mut pad, Button::L2, 0);
        assert_eq!(controls.poll_shortcuts(&mut pad, &mut ff), vec![ShortcutAction::SetFastForward(true)]);
        assert!(ff.toggled_on);

        pad.begin_poll();
        pad.update_button(Button::L2, false, 10);
        controls.poll_shortcuts(&mut pad, &mut ff);

        pad.begin_poll();
        press(&mut pad, Button::R2, 20);
        controls.poll_shortcuts(&mut pad, &mut ff);
        pad.begin_poll();
        pad.update_button(Button::R2, false, 30);
        assert!(controls.poll_shortcuts(&mut pad, &mut ff).is_empty());
        assert!(ff.active);
    }

    #[test]
    fn test_hold_fast_forward() {
        let mut controls = Controls::default();
        controls.set_shortcut(Shortcut::HoldFastForward, Binding::new(Button::R2));
        let mut ff = FastForward::default();
        let mut pad = PadState::new();

        press(&mut pad, Button::R2, 0);
        controls.poll_shortcuts(&mut pad, &mut ff);
        assert!(ff.active);

        pad.begin_poll();
        pad.update_button(Button::R2, false, 10);
        assert_eq!(controls.poll_shortcuts(&mut pad, &mut ff), vec![ShortcutAction::SetFastForward(false)]);
        assert!(!ff.active);
    }

    #[test]
    fn test_analog_queries() {
        let mut pad = PadState::new();
        pad.set_left_stick(1200, -3000, 0);
        pad.set_right_stick(-5, 7);

        assert_eq!(input_state(0, &pad, 0, retro::DEVICE_ANALOG, retro::ANALOG_LEFT, retro::ANALOG_X), 1200);
        assert_eq!(input_state(0, &pad, 0, retro::DEVICE_ANALOG, retro::ANALOG_LEFT, retro::ANALOG_Y), -3000);
        assert_eq!(input_state(0, &pad, 0, retro::DEVICE_ANALOG, retro::ANALOG_RIGHT, retro::ANALOG_Y), 7);
        assert_eq!(input_state(0, &pad, 0, retro::DEVICE_ANALOG, 2, retro::ANALOG_X), 0);
    }

    #[test]
    fn test_reset_defaults() {
        let mut controls = Controls::default();
        controls.set_control("A Button", Binding::new(Button::B));
        controls.set_shortcut(Shortcut::ResetGame, Binding::new(Button::Select));
        controls.reset_defaults();

        assert_eq!(controls.find_control("A Button").unwrap().binding, Binding::new(Button::A));
        assert_eq!(controls.shortcut(Shortcut::ResetGame), Binding::NONE);
    }
}
