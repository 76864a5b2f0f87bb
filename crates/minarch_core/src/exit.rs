/// Process exit codes understood by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    Success,
    Error,
    /// The user backed out, e.g. closed the window.
    Cancel,
    /// Hand control back to the launcher menu.
    Menu,
    Action,
    Inaction,
    Timeout,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Error => 1,
            ExitStatus::Cancel => 2,
            ExitStatus::Menu => 3,
            ExitStatus::Action => 4,
            ExitStatus::Inaction => 5,
            ExitStatus::Timeout => 124,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Menu.code(), 3);
        assert_eq!(ExitStatus::Timeout.code(), 124);
    }
}
