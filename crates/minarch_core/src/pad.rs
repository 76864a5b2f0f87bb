//! Edge-triggered device button state.
//!
//! The platform layer feeds raw press/release events and stick positions; menu and game code read the
//! `just_*` masks, which only live for a single poll cycle.

/// Time until a held button starts repeating.
pub const REPEAT_DELAY_MS: u32 = 300;
pub const REPEAT_INTERVAL_MS: u32 = 100;
/// Repeat interval once a button has been held for longer than [`REPEAT_ACCEL_AFTER_MS`].
pub const REPEAT_FAST_INTERVAL_MS: u32 = 50;
pub const REPEAT_ACCEL_AFTER_MS: u32 = 600;
/// Menu presses shorter than this count as a tap.
pub const MENU_TAP_MS: u32 = 250;
pub const AXIS_DEADZONE: i16 = 0x4000;

/// Physical buttons, the discriminant is the bit position in the masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Button {
    Up = 0,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    Start,
    Select,
    L1,
    R1,
    L2,
    R2,
    L3,
    R3,
    Menu,
    Plus,
    Minus,
    Power,
    PowerOff,
    AnalogUp,
    AnalogDown,
    AnalogLeft,
    AnalogRight,
}

pub const BUTTON_COUNT: usize = Button::AnalogRight as usize + 1;

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::Start,
        Button::Select,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::L3,
        Button::R3,
        Button::Menu,
        Button::Plus,
        Button::Minus,
        Button::Power,
        Button::PowerOff,
        Button::AnalogUp,
        Button::AnalogDown,
        Button::AnalogLeft,
        Button::AnalogRight,
    ];

    #[inline(always)]
    pub fn id(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub fn mask(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_id(id: usize) -> Option<Button> {
        Self::ALL.get(id).copied()
    }
}

/// Analog stick position, both axes in `i16` range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Axis {
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone)]
pub struct PadState {
    pub is_pressed: u32,
    pub just_pressed: u32,
    pub just_released: u32,
    pub just_repeated: u32,
    repeat_at: [u32; BUTTON_COUNT],
    /// When the current hold started, `None` while released.
    hold_start: [Option<u32>; BUTTON_COUNT],
    pub left_stick: Axis,
    pub right_stick: Axis,

    menu_start: u32,
    /// Set when a brightness/volume combo fired while the menu button was down.
    ignore_menu: bool,
}

impl Default for PadState {
    fn default() -> Self {
        Self::new()
    }
}

impl PadState {
    pub fn new() -> Self {
        Self {
            is_pressed: 0,
            just_pressed: 0,
            just_released: 0,
            just_repeated: 0,
            repeat_at: [0; BUTTON_COUNT],
            hold_start: [None; BUTTON_COUNT],
            left_stick: Axis::default(),
            right_stick: Axis::default(),
            menu_start: 0,
            ignore_menu: false,
        }
    }

    /// Release everything, used when switching between menu and game.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Clear the single-cycle masks. `is_pressed` survives.
    #[inline]
    pub fn begin_poll(&mut self) {
        self.just_pressed = 0;
        self.just_released = 0;
        self.just_repeated = 0;
    }

    /// Advance repeat timers of held buttons.
    pub fn handle_repeat(&mut self, now: u32) {
        for id in 0..BUTTON_COUNT {
            let mask = 1 << id;
            if self.is_pressed & mask == 0 || now < self.repeat_at[id] {
                continue;
            }

            self.just_repeated |= mask;

            let held_for = self.hold_start[id].map_or(0, |start| now.wrapping_sub(start));
            let interval = if held_for > REPEAT_ACCEL_AFTER_MS {
                REPEAT_FAST_INTERVAL_MS
            } else {
                REPEAT_INTERVAL_MS
            };
            self.repeat_at[id] = self.repeat_at[id].wrapping_add(interval);
        }
    }

    /// Record a physical press or release.
    pub fn update_button(&mut self, button: Button, pressed: bool, now: u32) {
        let id = button.id();
        let mask = button.mask();
        let was_pressed = self.is_pressed & mask != 0;

        if pressed && !was_pressed {
            self.press(id, now, now.wrapping_add(REPEAT_DELAY_MS));
        } else if !pressed && was_pressed {
            self.release(id);
        }
    }

    fn press(&mut self, id: usize, hold_start: u32, repeat_at: u32) {
        let mask = 1 << id;
        self.is_pressed |= mask;
        self.just_pressed |= mask;
        self.just_repeated |= mask;
        self.repeat_at[id] = repeat_at;
        self.hold_start[id] = Some(hold_start);
    }

    fn release(&mut self, id: usize) {
        let mask = 1 << id;
        self.is_pressed &= !mask;
        self.just_repeated &= !mask;
        self.just_released |= mask;
        self.hold_start[id] = None;
    }

    /// Translate one stick axis into a pair of opposing direction buttons.
    ///
    /// Flipping straight from one side to the other releases the old direction and back-dates the new hold by
    /// [`REPEAT_DELAY_MS`], so list acceleration carries over.
    pub fn set_analog(&mut self, negative: Button, positive: Button, value: i16, now: u32) {
        let (neg, pos) = (negative.id(), positive.id());
        let repeat_at = now.wrapping_add(REPEAT_DELAY_MS);

        let (active, opposite) = if value > AXIS_DEADZONE {
            (Some(pos), neg)
        } else if value < -AXIS_DEADZONE {
            (Some(neg), pos)
        } else {
            (None, pos)
        };

        match active {
            Some(active) => {
                if self.is_pressed & (1 << active) != 0 {
                    return;
                }

                let reversed = self.is_pressed & (1 << opposite) != 0;
                if reversed {
                    self.release(opposite);
                    self.press(active, now.wrapping_sub(REPEAT_DELAY_MS), repeat_at);
                } else {
                    self.press(active, now, repeat_at);
                }
            }
            None => {
                for id in [neg, pos] {
                    if self.is_pressed & (1 << id) != 0 {
                        self.release(id);
                    }
                }
            }
        }
    }

    /// Update the left stick and its digital direction buttons.
    pub fn set_left_stick(&mut self, x: i16, y: i16, now: u32) {
        self.left_stick = Axis { x, y };
        self.set_analog(Button::AnalogLeft, Button::AnalogRight, x, now);
        self.set_analog(Button::AnalogUp, Button::AnalogDown, y, now);
    }

    pub fn set_right_stick(&mut self, x: i16, y: i16) {
        self.right_stick = Axis { x, y };
    }

    /// Whether the menu button was tapped (short press, no combo) this cycle.
    ///
    /// Call once per poll, it tracks when the menu press started.
    pub fn tapped_menu(&mut self, now: u32) -> bool {
        if self.just_pressed(Button::Menu) {
            self.ignore_menu = false;
            self.menu_start = now;
        } else if self.is_pressed(Button::Menu) && (self.just_pressed(Button::Plus) || self.just_pressed(Button::Minus)) {
            self.ignore_menu = true;
        }

        !self.ignore_menu && self.just_released(Button::Menu) && now.wrapping_sub(self.menu_start) < MENU_TAP_MS
    }

    /// Stop the current menu press from counting as a tap, used when a `MENU+` binding fired.
    ///
    /// Takes effect for presses already seen by [`PadState::tapped_menu`], so call that first in a poll.
    pub fn suppress_menu_tap(&mut self) {
        self.ignore_menu = true;
    }

    #[inline]
    pub fn is_pressed(&self, button: Button) -> bool {
        self.is_pressed & button.mask() != 0
    }

    #[inline]
    pub fn just_pressed(&self, button: Button) -> bool {
        self.just_pressed & button.mask() != 0
    }

    #[inline]
    pub fn just_released(&self, button: Button) -> bool {
        self.just_released & button.mask() != 0
    }

    #[inline]
    pub fn just_repeated(&self, button: Button) -> bool {
        self.just_repeated & button.mask() != 0
    }

    pub fn any_pressed(&self) -> bool {
        self.is_pressed != 0
    }

    pub fn any_just_pressed(&self) -> bool {
        self.just_pressed != 0
    }
}
