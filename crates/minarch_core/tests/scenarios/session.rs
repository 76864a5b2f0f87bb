use minarch_core::config::{Config, ConfigLevel, ConfigPaths, WriteScope};
use minarch_core::environment::{EnvReply, EnvRequest, EnvResult, Environment};
use minarch_core::game::{emu_tag, CoreDirs, Game, Roots};
use minarch_core::input::{
    input_state, retro, Binding, Controls, FastForward, InputDescriptor, Shortcut, ShortcutAction,
};
use minarch_core::options::{FrontendOptions, OptionDefinition, OptionList};
use minarch_core::pad::{Button, PadState};
use minarch_core::scaler::ScalingMode;
use std::path::Path;

fn write_file(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn palette_definition() -> OptionDefinition {
    OptionDefinition {
        key: "gambatte_gb_colorization".into(),
        desc: "GB Colorization".into(),
        info: None,
        values: vec![
            ("disabled".into(), Some("Off".into())),
            ("auto".into(), Some("Auto".into())),
            ("internal".into(), None),
        ],
        default_value: Some("auto".into()),
    }
}

/// Open a game, run the option handshake, then layer the config cascade on top.
#[test]
pub fn test_handshake_then_config_cascade() {
    let sd = tempfile::tempdir().unwrap();
    let rom = sd.path().join("Roms/Game Boy (GB)/Tetris.gb");
    write_file(&rom, "rom");

    let tag = emu_tag(&rom);
    assert_eq!(tag, "GB");
    let roots = Roots {
        sdcard: sd.path().to_path_buf(),
        userdata: sd.path().join(".userdata/desktop"),
        shared_userdata: sd.path().join(".userdata/shared"),
        system: sd.path().join(".system"),
    };
    let dirs = CoreDirs::new(&roots, &tag, "gambatte");
    dirs.create_all().unwrap();
    let game = Game::open(&rom, false).unwrap();

    let paths = ConfigPaths {
        system_dir: roots.system.clone(),
        emu_dir: dirs.emu_dir.clone(),
        config_dir: dirs.config_dir.clone(),
        game_name: game.name.clone(),
        device: None,
    };
    write_file(&paths.system_file(), "minarch_screen_scaling = Native\n");
    write_file(&paths.default_file(), "-gambatte_gb_colorization = internal\n");
    write_file(
        &paths.user_file(WriteScope::Console),
        "gambatte_gb_colorization = disabled\nminarch_screen_scaling = Cropped\n",
    );

    let mut env = Environment::new(dirs.bios_dir.clone(), dirs.saves_dir.clone());
    let response = env.dispatch(EnvRequest::SetCoreOptions(Some(vec![palette_definition()])));
    assert_eq!(response.result, EnvResult::OK);
    assert_eq!(env.core_options.get_value("gambatte_gb_colorization"), Some("auto"));

    let config = Config::load(paths.clone()).unwrap();
    assert_eq!(config.loaded(), ConfigLevel::Console);
    assert_eq!(config.loaded().description(), "Using console config.");

    let mut frontend = FrontendOptions::new();
    config.apply_options(&mut frontend.list);
    config.apply_options(&mut env.core_options);

    assert_eq!(frontend.scaling(), ScalingMode::Cropped);
    // The user level still wins, the shipped lock only hides the option.
    let colorization = env.core_options.find("gambatte_gb_colorization").unwrap();
    assert_eq!(colorization.current_value(), Some("disabled"));
    assert!(colorization.lock);
    assert_eq!(
        env.dispatch(EnvRequest::GetVariable(Some("gambatte_gb_colorization"))).reply,
        EnvReply::Variable(Some("disabled"))
    );
    assert_eq!(env.dispatch(EnvRequest::GetVariableUpdate).reply, EnvReply::Bool(true));
    assert_eq!(env.dispatch(EnvRequest::GetVariableUpdate).reply, EnvReply::Bool(false));
}

#[test]
pub fn test_descriptors_shape_the_button_mask() {
    let mut env = Environment::new("/bios".into(), "/saves".into());
    let descriptors = vec![
        InputDescriptor {
            port: 0,
            device: retro::DEVICE_JOYPAD,
            index: 0,
            id: retro::JOYPAD_A,
            description: "Jump".into(),
        },
        InputDescriptor {
            port: 0,
            device: retro::DEVICE_JOYPAD,
            index: 0,
            id: retro::JOYPAD_START,
            description: "Pause".into(),
        },
    ];
    env.dispatch(EnvRequest::SetInputDescriptors(Some(descriptors)));

    let mut controls = Controls::default();
    if let Some(descriptors) = env.input_descriptors.take() {
        controls.apply_descriptors(&descriptors);
    }
    assert!(controls.find_control("Jump").is_some());
    assert!(controls.find_control("B Button").unwrap().ignore);

    let mut pad = PadState::new();
    pad.begin_poll();
    pad.update_button(Button::A, true, 10);
    pad.update_button(Button::B, true, 10);
    pad.update_button(Button::Start, true, 10);

    assert!(!pad.tapped_menu(10));
    let buttons = controls.collect_buttons(&mut pad);
    assert_eq!(buttons, (1 << retro::JOYPAD_A) | (1 << retro::JOYPAD_START));
    assert_eq!(input_state(buttons, &pad, 0, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_A), 1);
    assert_eq!(input_state(buttons, &pad, 0, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_B), 0);
    assert_eq!(
        input_state(buttons, &pad, 0, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_MASK),
        buttons as i16
    );
    assert_eq!(input_state(buttons, &pad, 1, retro::DEVICE_JOYPAD, 0, retro::JOYPAD_A), 0);
}

#[test]
pub fn test_saved_shortcut_fires_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths {
        system_dir: dir.path().join("system"),
        emu_dir: dir.path().join("emu"),
        config_dir: dir.path().join("config"),
        game_name: "Tetris.gb".into(),
        device: Some("desktop".into()),
    };

    let mut config = Config::load(paths.clone()).unwrap();
    assert_eq!(config.loaded().description(), "Using defaults.");

    let mut controls = Controls::default();
    controls.set_shortcut(Shortcut::SaveState, Binding::with_menu(Button::R1));
    let frontend = FrontendOptions::new();
    let path = config
        .write(WriteScope::Game, &frontend.list, &env_options(), None, &controls)
        .unwrap();
    assert!(path.ends_with("config/Tetris.gb-desktop.cfg"));

    let reloaded = Config::load(paths).unwrap();
    assert_eq!(reloaded.loaded(), ConfigLevel::Game);
    let mut fresh = Controls::default();
    reloaded.apply_controls(&mut fresh);

    let mut pad = PadState::new();
    let mut ff = FastForward::default();
    pad.begin_poll();
    pad.update_button(Button::Menu, true, 0);
    assert!(!pad.tapped_menu(0));
    pad.begin_poll();
    pad.update_button(Button::R1, true, 50);

    assert!(!pad.tapped_menu(50));
    assert_eq!(fresh.poll_shortcuts(&mut pad, &mut ff), vec![ShortcutAction::SaveState]);

    // Releasing MENU afterwards must not count as a tap.
    pad.begin_poll();
    pad.update_button(Button::R1, false, 80);
    pad.update_button(Button::Menu, false, 90);
    assert!(!pad.tapped_menu(90));
}

fn env_options() -> OptionList {
    OptionList::from_definitions(&[palette_definition()])
}
