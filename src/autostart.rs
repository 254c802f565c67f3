//! Registers cursorvibe to launch headless (`cursorvibe run`) at login.

use crate::error::AutostartError;
use std::fs;
use std::path::{Path, PathBuf};

const APP_ID: &str = "com.cursorvibe.agent";

fn current_exe() -> Result<PathBuf, AutostartError> {
    std::env::current_exe().map_err(AutostartError::Executable)
}

/// XDG autostart entry.
pub fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=CursorVibe\n\
         Comment=Keep your session awake while idle\n\
         Exec=\"{}\" run\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        exe.display()
    )
}

/// launchd user agent.
pub fn launch_agent_plist(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>run</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        label = APP_ID,
        exe = exe.display()
    )
}

/// Writes `contents` to `path`, creating parent directories as needed.
fn write_entry(path: &Path, contents: &str) -> Result<(), AutostartError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Removes the entry at `path`. A missing entry is not an error.
fn remove_entry(path: &Path) -> Result<(), AutostartError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(target_os = "linux")]
fn entry_path() -> Result<PathBuf, AutostartError> {
    let dir = dirs::config_dir().ok_or(AutostartError::MissingDir("config directory"))?;
    Ok(dir.join("autostart").join("cursorvibe.desktop"))
}

#[cfg(target_os = "macos")]
fn entry_path() -> Result<PathBuf, AutostartError> {
    let home = dirs::home_dir().ok_or(AutostartError::MissingDir("home directory"))?;
    Ok(home
        .join("Library")
        .join("LaunchAgents")
        .join(format!("{}.plist", APP_ID)))
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn render_entry(exe: &Path) -> String {
    if cfg!(target_os = "macos") {
        launch_agent_plist(exe)
    } else {
        desktop_entry(exe)
    }
}

pub fn enable() -> Result<(), AutostartError> {
    let exe = current_exe()?;

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        let path = entry_path()?;
        write_entry(&path, &render_entry(&exe))?;
        tracing::info!(path = %path.display(), "registered login startup");
        Ok(())
    }
    #[cfg(windows)]
    {
        registry::set(&format!("\"{}\" run", exe.display()))?;
        tracing::info!("registered login startup");
        Ok(())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    {
        let _ = exe;
        Err(AutostartError::Unsupported)
    }
}

pub fn disable() -> Result<(), AutostartError> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        let path = entry_path()?;
        remove_entry(&path)?;
        tracing::info!(path = %path.display(), "removed login startup");
        Ok(())
    }
    #[cfg(windows)]
    {
        registry::delete()?;
        tracing::info!("removed login startup");
        Ok(())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    {
        Err(AutostartError::Unsupported)
    }
}

pub fn is_enabled() -> Result<bool, AutostartError> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        Ok(entry_path()?.exists())
    }
    #[cfg(windows)]
    {
        registry::exists()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    {
        Err(AutostartError::Unsupported)
    }
}

/// Applies `on` and reports the resulting state.
pub fn set_enabled(on: bool) -> Result<bool, AutostartError> {
    if on {
        enable()?;
    } else {
        disable()?;
    }
    is_enabled()
}

#[cfg(windows)]
mod registry {
    use crate::error::AutostartError;
    use windows::core::w;
    use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
    use windows::Win32::System::Registry::{
        RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
        HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ,
    };

    fn check(call: &str, status: WIN32_ERROR) -> Result<(), AutostartError> {
        if status == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(AutostartError::Registry(format!("{} failed: {:?}", call, status)))
        }
    }

    fn open(access: REG_SAM_FLAGS) -> Result<HKEY, AutostartError> {
        let mut key = HKEY::default();
        let status = unsafe {
            RegOpenKeyExW(
                HKEY_CURRENT_USER,
                w!("Software\\Microsoft\\Windows\\CurrentVersion\\Run"),
                0,
                access,
                &mut key,
            )
        };
        check("RegOpenKeyExW", status)?;
        Ok(key)
    }

    pub fn set(command: &str) -> Result<(), AutostartError> {
        let key = open(KEY_SET_VALUE)?;
        let data: Vec<u8> = command
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        let status = unsafe { RegSetValueExW(key, w!("CursorVibe"), 0, REG_SZ, Some(&data)) };
        unsafe {
            let _ = RegCloseKey(key);
        }
        check("RegSetValueExW", status)
    }

    pub fn delete() -> Result<(), AutostartError> {
        let key = open(KEY_SET_VALUE)?;
        let status = unsafe { RegDeleteValueW(key, w!("CursorVibe")) };
        unsafe {
            let _ = RegCloseKey(key);
        }
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check("RegDeleteValueW", status)
    }

    pub fn exists() -> Result<bool, AutostartError> {
        let key = open(KEY_QUERY_VALUE)?;
        let status =
            unsafe { RegQueryValueExW(key, w!("CursorVibe"), None, None, None, None) };
        unsafe {
            let _ = RegCloseKey(key);
        }
        Ok(status == ERROR_SUCCESS)
    }
}
