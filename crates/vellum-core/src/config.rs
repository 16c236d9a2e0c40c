/// Engine-wide switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Runs the no-changes verification pass after every tick.
    pub dev_mode: bool,
}

impl EngineConfig {
    pub fn production() -> Self {
        Self { dev_mode: false }
    }

    pub fn development() -> Self {
        Self { dev_mode: true }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dev_mode: cfg!(debug_assertions),
        }
    }
}
