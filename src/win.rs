use std::ffi::{c_void, OsStr};
use std::fs;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use rand::Rng;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, ERROR_MORE_DATA, ERROR_SUCCESS, HANDLE, HWND, LUID,
};
use windows::Win32::Security::{
    AdjustTokenPrivileges, GetTokenInformation, LookupPrivilegeValueW, TokenElevation,
    LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_ELEVATION,
    TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_DELAY_UNTIL_REBOOT};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::RestartManager::{
    RmEndSession, RmGetList, RmRegisterResources, RmStartSession, CCH_RM_SESSION_KEY,
    RM_PROCESS_INFO,
};
use windows::Win32::System::Threading::{
    GetCurrentProcess, OpenProcess, OpenProcessToken, TerminateProcess, PROCESS_TERMINATE,
};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

use crate::platform::{Platform, ProcessInfo};

/// Privileges that let the pipeline cross ownership and ACL walls.
const WANTED_PRIVILEGES: &[&str] = &[
    "SeDebugPrivilege",
    "SeTakeOwnershipPrivilege",
    "SeBackupPrivilege",
    "SeRestorePrivilege",
];

/// Upper bound on files registered with the Restart Manager per scan.
const HANDLE_SCAN_FILE_CAP: usize = 512;

pub struct WinPlatform;

impl WinPlatform {
    pub fn new() -> Self {
        enable_privileges();
        WinPlatform
    }
}

impl Platform for WinPlatform {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        let mut out = Vec::new();
        unsafe {
            let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
                return out;
            };
            let mut entry = PROCESSENTRY32W::default();
            entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;

            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let len = entry
                        .szExeFile
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szExeFile.len());
                    out.push(ProcessInfo {
                        pid: entry.th32ProcessID,
                        parent_pid: entry.th32ParentProcessID,
                        name: String::from_utf16_lossy(&entry.szExeFile[..len]),
                    });
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);
        }
        out
    }

    /// Asks the Restart Manager which processes hold files under the tree.
    /// Registration is capped; the scan degrades to an empty answer on any
    /// error rather than blocking the purge.
    fn lock_holders(&self, path: &Path) -> Vec<u32> {
        let mut files = Vec::new();
        collect_files(path, &mut files, HANDLE_SCAN_FILE_CAP);
        if files.is_empty() {
            return Vec::new();
        }

        let wide_paths: Vec<Vec<u16>> = files.iter().map(|f| wide(f.as_os_str())).collect();
        let resources: Vec<PCWSTR> = wide_paths.iter().map(|w| PCWSTR(w.as_ptr())).collect();

        let mut pids = Vec::new();
        unsafe {
            let mut session = 0u32;
            let mut key = [0u16; CCH_RM_SESSION_KEY as usize + 1];
            if RmStartSession(&mut session, 0, PWSTR(key.as_mut_ptr())) != ERROR_SUCCESS {
                return pids;
            }

            if RmRegisterResources(session, Some(&resources), None, None) == ERROR_SUCCESS {
                let mut needed = 0u32;
                let mut count = 0u32;
                let mut reasons = 0u32;
                let rc = RmGetList(session, &mut needed, &mut count, None, &mut reasons);
                if rc == ERROR_MORE_DATA && needed > 0 {
                    let mut infos = vec![RM_PROCESS_INFO::default(); needed as usize];
                    count = needed;
                    if RmGetList(
                        session,
                        &mut needed,
                        &mut count,
                        Some(infos.as_mut_ptr()),
                        &mut reasons,
                    ) == ERROR_SUCCESS
                    {
                        for info in infos.iter().take(count as usize) {
                            pids.push(info.Process.dwProcessId);
                        }
                    }
                }
            }
            let _ = RmEndSession(session);
        }
        pids
    }

    fn kill_process(&self, pid: u32) -> io::Result<()> {
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, false, pid).map_err(win_err)?;
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            result.map_err(win_err)
        }
    }

    fn take_ownership(&self, path: &Path) -> io::Result<()> {
        run_quiet(Command::new("takeown").arg("/F").arg(path).args(["/R", "/D", "Y"]))
    }

    fn grant_full_access(&self, path: &Path) -> io::Result<()> {
        run_quiet(
            Command::new("icacls")
                .arg(path)
                .args(["/grant", "administrators:F", "/T", "/C", "/Q"]),
        )
    }

    fn clear_attributes(&self, path: &Path) -> io::Result<()> {
        run_quiet(Command::new("attrib").args(["-r", "-s", "-h"]).arg(path))?;
        run_quiet(
            Command::new("attrib")
                .args(["-r", "-s", "-h"])
                .arg(path.join("*.*"))
                .args(["/S", "/D"]),
        )
    }

    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn shell_remove_tree(&self, path: &Path) -> io::Result<()> {
        run_quiet(Command::new("cmd").args(["/C", "rd", "/S", "/Q"]).arg(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn run_script_elevated(&self, script: &str) -> io::Result<()> {
        let batch_path = std::env::temp_dir().join(format!("purge_{}.bat", random_suffix()));
        fs::write(&batch_path, script)?;

        // Start-Process with -Verb RunAs is the supported route to the
        // consent prompt; -Wait blocks until the script exits.
        let command = format!(
            "Start-Process -FilePath 'cmd.exe' -ArgumentList '/C','\"{}\"' -Verb RunAs -Wait",
            batch_path.display()
        );
        let result = run_quiet(Command::new("powershell").args(["-NoProfile", "-Command", &command]));
        let _ = fs::remove_file(&batch_path);
        result
    }

    /// The boot-time pass deletes files and only empty directories, so the
    /// tree is registered contents first, deepest directories next, root last.
    fn schedule_delete_on_reboot(&self, path: &Path) -> io::Result<()> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        collect_tree(path, &mut files, &mut dirs);

        for file in &files {
            let _ = schedule_one(file);
        }
        for dir in dirs.iter().rev() {
            let _ = schedule_one(dir);
        }
        schedule_one(path)
    }
}

/// Registers one path in the pending-file-rename list consumed during the
/// next boot. An empty destination means "delete". Requires administrator
/// rights; the list is appended to, never replaced.
fn schedule_one(path: &Path) -> io::Result<()> {
    let target = extended(path);
    let wide_path = wide(target.as_os_str());
    unsafe {
        MoveFileExW(
            PCWSTR(wide_path.as_ptr()),
            PCWSTR::null(),
            MOVEFILE_DELAY_UNTIL_REBOOT,
        )
        .map_err(win_err)
    }
}

/// Checks whether the current process token is elevated.
pub fn is_elevated() -> bool {
    unsafe {
        let mut token = HANDLE::default();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_ok() {
            let mut elevation = TOKEN_ELEVATION::default();
            let mut size = 0u32;
            let ok = GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut _ as *mut c_void),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut size,
            )
            .is_ok();
            let _ = CloseHandle(token);
            if ok {
                return elevation.TokenIsElevated != 0;
            }
        }
    }
    false
}

/// Relaunches the current executable through the consent prompt, forwarding
/// the original arguments, then exits this unelevated instance.
pub fn relaunch_elevated() -> ! {
    if let Ok(exe) = std::env::current_exe() {
        let joined = std::env::args()
            .skip(1)
            .map(|arg| format!("\"{arg}\""))
            .collect::<Vec<_>>()
            .join(" ");
        let exe_w = wide(exe.as_os_str());
        let verb = wide(OsStr::new("runas"));
        let params = wide(OsStr::new(&joined));
        unsafe {
            ShellExecuteW(
                HWND::default(),
                PCWSTR(verb.as_ptr()),
                PCWSTR(exe_w.as_ptr()),
                PCWSTR(params.as_ptr()),
                PCWSTR::null(),
                SW_SHOWNORMAL,
            );
        }
    }
    std::process::exit(0);
}

/// Best effort: each privilege that cannot be enabled is simply skipped.
fn enable_privileges() {
    unsafe {
        let mut token = HANDLE::default();
        if OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
        .is_err()
        {
            return;
        }
        for name in WANTED_PRIVILEGES {
            let wide_name = wide(OsStr::new(name));
            let mut luid = LUID::default();
            if LookupPrivilegeValueW(PCWSTR::null(), PCWSTR(wide_name.as_ptr()), &mut luid).is_ok()
            {
                let privileges = TOKEN_PRIVILEGES {
                    PrivilegeCount: 1,
                    Privileges: [LUID_AND_ATTRIBUTES {
                        Luid: luid,
                        Attributes: SE_PRIVILEGE_ENABLED,
                    }],
                };
                let _ = AdjustTokenPrivileges(token, false, Some(&privileges), 0, None, None);
            }
        }
        let _ = CloseHandle(token);
    }
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Paths past MAX_PATH need the extended-length prefix for the wide APIs.
fn extended(path: &Path) -> PathBuf {
    let raw = path.as_os_str();
    if raw.len() > 259 && !path.to_string_lossy().starts_with(r"\\?\") {
        let mut prefixed = std::ffi::OsString::from(r"\\?\");
        prefixed.push(raw);
        PathBuf::from(prefixed)
    } else {
        path.to_path_buf()
    }
}

fn win_err(e: windows::core::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn run_quiet(cmd: &mut Command) -> io::Result<()> {
    let output = cmd.output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{:?} exited with {}", cmd.get_program(), output.status),
        ))
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>, cap: usize) {
    if out.len() >= cap {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if out.len() >= cap {
            return;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out, cap);
        } else {
            out.push(path);
        }
    }
}

fn collect_tree(dir: &Path, files: &mut Vec<PathBuf>, dirs: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path.clone());
            collect_tree(&path, files, dirs);
        } else {
            files.push(path);
        }
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}
