use minarch_core::input::{input_state, Controls, FastForward, ShortcutAction};
use minarch_core::pad::{Button, PadState};
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode};

/// A key event the runner forwards to the pad on the next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Button(Button, bool),
    /// Desktop-only fast-forward key, independent of the configured shortcuts.
    FastForward(bool),
}

pub fn keyboard_to_input(input: KeyboardInput) -> Option<KeyInput> {
    let pressed = input.state == ElementState::Pressed;
    let button = match input.virtual_keycode? {
        VirtualKeyCode::Up => Button::Up,
        VirtualKeyCode::Down => Button::Down,
        VirtualKeyCode::Left => Button::Left,
        VirtualKeyCode::Right => Button::Right,
        VirtualKeyCode::X => Button::A,
        VirtualKeyCode::Z => Button::B,
        VirtualKeyCode::S => Button::X,
        VirtualKeyCode::A => Button::Y,
        VirtualKeyCode::Return => Button::Start,
        VirtualKeyCode::RShift => Button::Select,
        VirtualKeyCode::Q => Button::L1,
        VirtualKeyCode::W => Button::R1,
        VirtualKeyCode::Escape => Button::Menu,
        VirtualKeyCode::Equals => Button::Plus,
        VirtualKeyCode::Minus => Button::Minus,
        VirtualKeyCode::P => Button::Power,
        VirtualKeyCode::Tab => return Some(KeyInput::FastForward(pressed)),
        _ => return None,
    };

    Some(KeyInput::Button(button, pressed))
}

/// Input side of the host, updated from the core's `input_poll`.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub pad: PadState,
    pub controls: Controls,
    pub fast_forward: FastForward,
    /// libretro button mask produced by the last poll.
    pub buttons: u32,
    pending: Vec<KeyInput>,
    actions: Vec<ShortcutAction>,
    menu_tapped: bool,
    polled: bool,
}

impl InputState {
    pub fn new(controls: Controls) -> Self {
        Self {
            controls,
            ..Default::default()
        }
    }

    pub fn queue(&mut self, key: KeyInput) {
        self.pending.push(key);
    }

    pub fn poll(&mut self, now: u32) {
        self.polled = true;
        self.pad.begin_poll();

        for key in self.pending.drain(..) {
            match key {
                KeyInput::Button(button, pressed) => self.pad.update_button(button, pressed, now),
                KeyInput::FastForward(true) => {
                    self.fast_forward.active = !self.fast_forward.active;
                    self.fast_forward.toggled_on = self.fast_forward.active;
                    self.actions.push(ShortcutAction::SetFastForward(self.fast_forward.active));
                }
                KeyInput::FastForward(false) => {}
            }
        }
        self.pad.handle_repeat(now);

        // Must run before the bindings get a chance to suppress the tap of this very poll.
        if self.pad.tapped_menu(now) {
            self.menu_tapped = true;
        }

        self.buttons = self.controls.collect_buttons(&mut self.pad);
        let actions = self.controls.poll_shortcuts(&mut self.pad, &mut self.fast_forward);
        self.actions.extend(actions);
    }

    pub fn state(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        input_state(self.buttons, &self.pad, port, device, index, id)
    }

    /// Whether the core polled since the last call.
    pub fn take_polled(&mut self) -> bool {
        std::mem::take(&mut self.polled)
    }

    pub fn take_actions(&mut self) -> Vec<ShortcutAction> {
        std::mem::take(&mut self.actions)
    }

    pub fn take_menu_tapped(&mut self) -> bool {
        std::mem::take(&mut self.menu_tapped)
    }
}
