//! File extensions a web page must never be able to write.
//!
//! `printToFile` lets any page the user allows pick an output path.  Without
//! this list, a page could drop an executable or script into the startup
//! folder.  The check is on the final extension, case-insensitively.

use std::path::Path;

/// Executable, script, installer and macro-capable document extensions.
pub const DENIED_EXTENSIONS: &[&str] = &[
    // Windows executables and scripts
    "exe", "pif", "paf", "application", "msi", "com", "cmd", "bat", "lnk",
    "gadget", "msp", "mst", "cpl", "scr", "ins", "hta", "msc",
    // Java
    "jar", "jnlp",
    // Windows Script Host
    "vb", "vbs", "vbe", "js", "jse", "ws", "wsf", "wsc", "wsh",
    // PowerShell / Monad
    "ps1", "ps1xml", "ps2", "ps2xml", "psc1", "psc2",
    "msh", "msh1", "msh2", "mshxml", "msh1xml", "msh2xml",
    // Explorer / AutoRun / registry
    "scf", "inf", "reg",
    // Office documents that can carry macros
    "doc", "docx", "dot", "dotx", "dotm",
    "xls", "xlt", "xlm", "xlsx", "xlsm", "xltx", "xltm", "xlsb", "xla", "xlam", "xll", "xlw",
    "ppt", "pps", "pptx", "pptm", "potx", "potm", "ppam", "ppsx", "ppsm", "sldx", "sldm",
    "ade", "adp", "adn", "accdb", "accdr", "accdt", "mdb", "mda", "mdn", "mdt",
    "mdw", "mdf", "mde", "accde", "mam", "maq", "mar", "mat", "maf", "ldb", "laccdb",
    // macOS applications
    "app", "action", "bin", "command", "workflow",
    // Unix scripts
    "sh", "ksh", "csh", "pl", "py", "bash", "run",
    // Mobile apps, widgets, shortcuts
    "ipa", "apk", "widget", "url",
];

/// Returns the final extension of `path`'s file name, lower-cased.
///
/// Trailing dots and spaces are ignored because Windows strips them when
/// creating the file (`out.exe.` becomes `out.exe`).  A leading-dot name
/// such as `.bat` counts as extension `bat`.
fn final_extension(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    let trimmed = file_name.trim_end_matches(['.', ' ']);
    let (_, extension) = trimmed.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// `true` if `path` ends in a denied extension.
pub fn is_denied(path: &Path) -> bool {
    final_extension(path)
        .map(|ext| DENIED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
