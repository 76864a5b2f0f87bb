use std::path::PathBuf;

use minarch_core::ExitStatus;

use crate::input::KeyInput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatorMessage {
    /// Informs the emulator thread that it should wrap up the session and exit with the given status.
    Quit(ExitStatus),
    Key(KeyInput),
    /// Swap the inserted disc for another image of the same game.
    ChangeDisc(PathBuf),
}
