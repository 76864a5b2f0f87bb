use std::path::PathBuf;

use anyhow::Context;
use minarch_core::game::Roots;
use platform_dirs::AppDirs;

use crate::args::MainArgs;

pub const SETTINGS_FILE: &str = "msettings.bin";
pub const SHARED_SETTINGS_FILE: &str = "msettings.shm";
pub const RESUME_SLOT_FILE: &str = ".minui/resume_slot.txt";

/// Resolve the filesystem roots, explicit paths win over the per-user application directory.
pub fn resolve_roots(args: &MainArgs) -> anyhow::Result<Roots> {
    let fallback = || -> anyhow::Result<PathBuf> { Ok(get_app_dirs()?.data_dir) };

    let sdcard = match &args.sdcard {
        Some(path) => path.clone(),
        None => fallback()?,
    };
    let userdata = match &args.userdata {
        Some(path) => path.clone(),
        None => sdcard.join(".userdata").join(args.device.as_deref().unwrap_or("desktop")),
    };
    let shared_userdata = match &args.shared_userdata {
        Some(path) => path.clone(),
        None => sdcard.join(".userdata").join("shared"),
    };
    let system = match &args.system {
        Some(path) => path.clone(),
        None => sdcard.join(".system"),
    };

    log::debug!(
        "Roots - sdcard: {:?} userdata: {:?} shared: {:?} system: {:?}",
        sdcard,
        userdata,
        shared_userdata,
        system
    );

    Ok(Roots {
        sdcard,
        userdata,
        shared_userdata,
        system,
    })
}

pub fn get_settings_path(roots: &Roots) -> PathBuf {
    roots.userdata.join(SETTINGS_FILE)
}

pub fn get_shared_settings_path(roots: &Roots) -> PathBuf {
    roots.userdata.join(SHARED_SETTINGS_FILE)
}

pub fn get_resume_slot_path(roots: &Roots) -> PathBuf {
    roots.shared_userdata.join(RESUME_SLOT_FILE)
}

pub fn get_app_dirs() -> anyhow::Result<AppDirs> {
    platform_dirs::AppDirs::new(Some("minarch"), false).context("Couldn't find a home directory for the data root")
}
