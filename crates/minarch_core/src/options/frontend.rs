use crate::options::{CoreOption, OptionList};
use crate::scaler::{Effect, ScalingMode, Sharpness};

/// The frontend's own settings, stored next to the core options in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendOption {
    Scaling,
    Effect,
    Sharpness,
    DebugHud,
    MaxFfSpeed,
}

impl FrontendOption {
    pub const ALL: [FrontendOption; 5] = [
        FrontendOption::Scaling,
        FrontendOption::Effect,
        FrontendOption::Sharpness,
        FrontendOption::DebugHud,
        FrontendOption::MaxFfSpeed,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FrontendOption::Scaling => "minarch_screen_scaling",
            FrontendOption::Effect => "minarch_screen_effect",
            FrontendOption::Sharpness => "minarch_screen_sharpness",
            FrontendOption::DebugHud => "minarch_debug_hud",
            FrontendOption::MaxFfSpeed => "minarch_max_ff_speed",
        }
    }

    fn name(self) -> &'static str {
        match self {
            FrontendOption::Scaling => "Screen Scaling",
            FrontendOption::Effect => "Screen Effect",
            FrontendOption::Sharpness => "Screen Sharpness",
            FrontendOption::DebugHud => "Debug HUD",
            FrontendOption::MaxFfSpeed => "Max FF Speed",
        }
    }

    fn desc(self) -> &'static str {
        match self {
            FrontendOption::Scaling => "Native uses integer scaling. Aspect uses core reported aspect ratio.\nFullscreen has non-square pixels. Cropped is integer scaled then cropped.",
            FrontendOption::Effect => "Grid simulates an LCD grid.\nLine simulates CRT scanlines.",
            FrontendOption::Sharpness => "Sharp uses nearest neighbor sampling.\nCrisp integer upscales before linear sampling.\nSoft uses linear sampling.",
            FrontendOption::DebugHud => "Show frames per second and resolution info.",
            FrontendOption::MaxFfSpeed => "Fast forward will not exceed the selected speed\n(but may be limited by the core).",
        }
    }

    fn values(self) -> &'static [&'static str] {
        match self {
            FrontendOption::Scaling => &["Native", "Aspect", "Fullscreen", "Cropped"],
            FrontendOption::Effect => &["None", "Line", "Grid"],
            FrontendOption::Sharpness => &["Sharp", "Crisp", "Soft"],
            FrontendOption::DebugHud => &["Off", "On"],
            FrontendOption::MaxFfSpeed => &["None", "2x", "3x", "4x", "5x", "6x", "7x", "8x"],
        }
    }

    fn default_index(self) -> usize {
        match self {
            FrontendOption::Scaling => ScalingMode::default().index(),
            FrontendOption::Effect => Effect::default().index(),
            FrontendOption::Sharpness => 2,
            FrontendOption::DebugHud => 0,
            FrontendOption::MaxFfSpeed => 3,
        }
    }

    fn to_option(self) -> CoreOption {
        let values: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        CoreOption {
            key: self.key().to_string(),
            name: self.name().to_string(),
            desc: Some(self.desc().to_string()),
            labels: values.clone(),
            values,
            default_index: self.default_index(),
            value: self.default_index(),
            lock: false,
            visible: true,
        }
    }
}

/// Typed view over the frontend [`OptionList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendOptions {
    pub list: OptionList,
}

impl Default for FrontendOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontendOptions {
    pub fn new() -> Self {
        Self {
            list: OptionList::new(FrontendOption::ALL.iter().map(|o| o.to_option()).collect()),
        }
    }

    fn index(&self, option: FrontendOption) -> usize {
        self.list.find(option.key()).map_or(0, |o| o.value)
    }

    fn set_index(&mut self, option: FrontendOption, index: usize) {
        self.list.set_raw_value(option.key(), index);
    }

    pub fn scaling(&self) -> ScalingMode {
        ScalingMode::from_index(self.index(FrontendOption::Scaling))
    }

    pub fn set_scaling(&mut self, mode: ScalingMode) {
        self.set_index(FrontendOption::Scaling, mode.index());
    }

    pub fn effect(&self) -> Effect {
        Effect::from_index(self.index(FrontendOption::Effect))
    }

    pub fn set_effect(&mut self, effect: Effect) {
        self.set_index(FrontendOption::Effect, effect.index());
    }

    pub fn sharpness(&self) -> Sharpness {
        Sharpness::from_index(self.index(FrontendOption::Sharpness))
    }

    pub fn debug_hud(&self) -> bool {
        self.index(FrontendOption::DebugHud) == 1
    }

    /// Extra speed multiples allowed while fast-forwarding, `0` means unlimited.
    pub fn max_ff_speed(&self) -> u32 {
        self.index(FrontendOption::MaxFfSpeed) as u32
    }
}
