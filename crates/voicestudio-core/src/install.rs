//! Installable packages and pip output classification.

/// Progress identifier used by the CUDA repair operation.
pub const CUDA_OPERATION: &str = "cuda";

/// Index serving the CUDA 12.1 PyTorch wheels.
pub const CUDA_WHEEL_INDEX: &str = "https://download.pytorch.org/whl/cu121";

/// Number of trailing output lines reported when an install fails.
pub const ERROR_TAIL_LINES: usize = 5;

const PACKAGES: &[(&str, &[&str])] = &[
    ("kokoro", &["kokoro>=0.8", "soundfile"]),
    ("fish-speech", &["fish-speech"]),
    ("f5-tts", &["f5-tts"]),
    ("parler-tts", &["parler-tts"]),
];

/// pip requirement specifiers for an installable engine.
pub fn install_packages(name: &str) -> Option<&'static [&'static str]> {
    PACKAGES
        .iter()
        .find(|(engine, _)| *engine == name)
        .map(|(_, packages)| *packages)
}

/// Names accepted by [`install_packages`].
pub fn installable_engines() -> impl Iterator<Item = &'static str> {
    PACKAGES.iter().map(|(engine, _)| *engine)
}

/// pip failed because files were locked or not writable.
pub fn is_permission_error(output: &str) -> bool {
    output.contains("Access is denied")
        || output.contains("Permission denied")
        || output.contains("WinError 5")
}

/// pip failed because Windows holds the files open.
pub fn is_windows_lock_error(output: &str) -> bool {
    output.contains("Access is denied") || output.contains("WinError 5")
}

/// Message shown when a Windows file lock blocks the install.
pub fn windows_lock_hint(packages: &[&str]) -> String {
    format!(
        "Windows is blocking file replacement because the server has them loaded. \
         Stop the server, run 'pip install {}' manually, then restart.",
        packages.join(" ")
    )
}

/// The last [`ERROR_TAIL_LINES`] lines of `output`, newline-joined.
pub fn error_tail(output: &[String]) -> String {
    let start = output.len().saturating_sub(ERROR_TAIL_LINES);
    output[start..].join("\n")
}
