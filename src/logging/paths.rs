use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tts_relay";

/// Get the log directory for this user
///
/// Resolution order:
/// 1. Custom directory from parameter (if provided)
/// 2. Platform log location (`~/Library/Logs` on macOS, local data dir elsewhere)
/// 3. Home directory fallback
/// 4. Temp directory as last resort
pub fn get_log_directory(custom_dir: Option<&str>) -> Result<PathBuf, std::io::Error> {
    if let Some(dir) = custom_dir {
        return ensure_directory_exists(PathBuf::from(dir));
    }

    ensure_directory_exists(default_log_dir())
}

fn default_log_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        if let Some(home_dir) = dirs::home_dir() {
            let logs_dir = home_dir.join("Library").join("Logs").join(APP_DIR);
            if can_create(&logs_dir) {
                return logs_dir;
            }
        }
    }

    if let Some(data_dir) = dirs::data_local_dir() {
        let path = data_dir.join(APP_DIR).join("logs");
        if can_create(&path) {
            return path;
        }
    }

    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".local").join(APP_DIR).join("logs");
    }

    env::temp_dir().join("tts_relay_logs")
}

/// Check if a directory is writable
fn is_writable(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let test_file = path.join(".write_test");
    fs::write(&test_file, "test").is_ok() && {
        let _ = fs::remove_file(&test_file);
        true
    }
}

/// Check if the directory exists writable, or its nearest existing parent is
fn can_create(path: &Path) -> bool {
    match path.ancestors().find(|p| p.exists()) {
        Some(existing) => is_writable(existing),
        None => false,
    }
}

fn ensure_directory_exists(path: PathBuf) -> Result<PathBuf, std::io::Error> {
    if !path.exists() {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}
