//! ROM paths, multi-disc playlists and the per-core directory layout derived from them.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Could not read game file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Game file {0:?} does not exist")]
    Missing(PathBuf),
}

/// Split a core's `valid_extensions` string (`"gb|gbc|dmg"`).
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split('|')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Whether the file name of `path` ends in one of `extensions`, ignoring case.
///
/// A leading dot does not start an extension, so `.gb` has none.
pub fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };

    let ext = match name.rfind('.') {
        Some(0) | None => return false,
        Some(at) => &name[at + 1..],
    };

    extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

/// Candidate playlist for a disc image: `{grandparent}/{parent}.m3u`.
///
/// Returns `None` for files at the filesystem root or directly below it, there is no console directory to hold a
/// playlist there.
pub fn m3u_path(rom: &Path) -> Option<PathBuf> {
    let parent = rom.parent()?;
    let dir_name = parent.file_name()?;
    let grandparent = parent.parent()?;

    if grandparent.as_os_str().is_empty() || grandparent.parent().is_none() {
        return None;
    }

    let mut file = dir_name.to_os_string();
    file.push(".m3u");
    Some(grandparent.join(file))
}

/// Emulator tag for a ROM, taken from its console directory under `Roms/`.
///
/// `Roms/Game Boy (GB)/Tetris.gb` gives `GB`, `Roms/GB/sub/Tetris.gb` gives `GB`. Without a `Roms` ancestor the
/// ROM's own parent directory is used.
pub fn emu_tag(rom: &Path) -> String {
    let components: Vec<_> = rom
        .parent()
        .map(|parent| parent.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect())
        .unwrap_or_default();

    let console = components
        .iter()
        .position(|c| c.eq_ignore_ascii_case("Roms"))
        .and_then(|at| components.get(at + 1))
        .or_else(|| components.last())
        .cloned()
        .unwrap_or_default();

    tag_from_dir_name(&console)
}

fn tag_from_dir_name(name: &str) -> String {
    match (name.rfind('('), name.rfind(')')) {
        (Some(open), Some(close)) if open < close => name[open + 1..close].to_owned(),
        _ => name.to_owned(),
    }
}

/// Short core name: the core file's basename up to the last `_`.
///
/// `fceumm_libretro.so` gives `fceumm`, a name without `_` is returned without its extension.
pub fn core_name(core_file: &Path) -> String {
    let stem = core_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match stem.rfind('_') {
        Some(at) if at > 0 => stem[..at].to_owned(),
        _ => stem,
    }
}

/// Filesystem roots the per-core directories are derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roots {
    pub sdcard: PathBuf,
    pub userdata: PathBuf,
    pub shared_userdata: PathBuf,
    pub system: PathBuf,
}

/// Where one core keeps its configs, states, saves and BIOS files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreDirs {
    pub config_dir: PathBuf,
    pub states_dir: PathBuf,
    pub saves_dir: PathBuf,
    pub bios_dir: PathBuf,
    /// Console-wide defaults, `{userdata}/{tag}`.
    pub emu_dir: PathBuf,
}

impl CoreDirs {
    pub fn new(roots: &Roots, tag: &str, core: &str) -> Self {
        let tagged_bios = roots.sdcard.join("Bios").join(tag);
        let bios_dir = if has_visible_files(&tagged_bios) {
            tagged_bios
        } else {
            roots.sdcard.join("Bios")
        };

        Self {
            config_dir: roots.userdata.join(format!("{}-{}", tag, core)),
            states_dir: roots.shared_userdata.join(format!("{}-{}", tag, core)),
            saves_dir: roots.sdcard.join("Saves").join(tag),
            bios_dir,
            emu_dir: roots.userdata.join(tag),
        }
    }

    pub fn create_all(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.states_dir, &self.saves_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn has_visible_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        })
        .unwrap_or(false)
}

/// The content handed to the core.
#[derive(Debug, Clone, Default)]
pub struct Game {
    /// Path reported to the core, the playlist when one was found.
    pub path: PathBuf,
    /// The disc or ROM that was actually opened.
    pub rom_path: PathBuf,
    /// File name used for saves and states.
    pub name: String,
    pub m3u_path: Option<PathBuf>,
    /// ROM contents, empty when the core loads from the path itself.
    pub data: Vec<u8>,
}

impl Game {
    pub fn open(path: impl Into<PathBuf>, need_fullpath: bool) -> Result<Self, GameError> {
        let rom_path = path.into();
        if !rom_path.exists() {
            return Err(GameError::Missing(rom_path));
        }

        let data = if need_fullpath {
            Vec::new()
        } else {
            std::fs::read(&rom_path).map_err(|source| GameError::Read {
                path: rom_path.clone(),
                source,
            })?
        };

        let mut game = Game {
            path: rom_path.clone(),
            name: file_name(&rom_path),
            rom_path,
            m3u_path: None,
            data,
        };

        if let Some(m3u) = m3u_path(&game.rom_path).filter(|m3u| m3u.is_file()) {
            log::debug!("Found playlist {:?}", m3u);
            game.name = file_name(&m3u);
            game.path = m3u.clone();
            game.m3u_path = Some(m3u);
        }

        log::info!("Opened game {:?} ({} bytes in memory)", game.name, game.data.len());
        Ok(game)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether switching to `path` needs a disc swap.
    ///
    /// Unchanged or missing paths are not worth re-opening.
    pub fn needs_disc_change(&self, path: &Path) -> bool {
        path != self.rom_path && path.exists()
    }

    /// Re-open the game with another disc, keeping the playlist based identity.
    ///
    /// # Returns
    /// * `Ok(true)` - The game now points at `path`, the core should be told to replace image `0`.
    /// * `Ok(false)` - Nothing to do.
    pub fn change_disc(&mut self, path: &Path, need_fullpath: bool) -> Result<bool, GameError> {
        if !self.needs_disc_change(path) {
            return Ok(false);
        }

        let reopened = Game::open(path, need_fullpath)?;
        log::info!("Changing disc to {:?}", path);
        *self = reopened;
        Ok(true)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
