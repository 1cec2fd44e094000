use std::fmt;

/// Where a [`UserGenerator`](crate::lifecycle::UserGenerator) is in its life.
///
/// ```text
/// Unconfigured -> SettingUp -> Active -> CleaningUp -> Closed
///                     \______________________/^
///                      (setup failure cleans up before returning)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Unconfigured,
    SettingUp,
    Active,
    CleaningUp,
    Closed,
}

impl ContextState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextState::Unconfigured => "unconfigured",
            ContextState::SettingUp => "setting_up",
            ContextState::Active => "active",
            ContextState::CleaningUp => "cleaning_up",
            ContextState::Closed => "closed",
        }
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
