//! Platform family detection and package-manager command mapping (component J).
//!
//! The agent never shells out to a package manager without knowing which
//! one it is talking to. [`Platform::detect`] identifies the host family
//! once at startup; [`Platform::package_command`] turns a request/source
//! pair into the argv the platform's native tool expects.

use std::fmt;

/// The host's operating-system family, as far as package management is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Debian,
    Rhel,
    Darwin,
    Windows,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Debian => "debian",
            Platform::Rhel => "rhel",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
        };
        write!(f, "{name}")
    }
}

/// A package-management request: install or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageRequest {
    Install,
    Uninstall,
}

/// Where the package payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSource {
    /// Resolved by the platform's package index (`apt-get install NAME`).
    Internet,
    /// A local file path (`dpkg -i /path/to.deb`).
    File,
}

impl Platform {
    /// Detects the platform family from `std::env::consts::OS`, falling
    /// back to `/etc/os-release` content for the debian/rhel split on Linux.
    pub fn detect() -> Result<Self, crate::error::AgentError> {
        match std::env::consts::OS {
            "macos" => Ok(Platform::Darwin),
            "windows" => Ok(Platform::Windows),
            "linux" => Self::detect_linux_family(),
            _ => Err(crate::error::AgentError::UnsupportedPlatform),
        }
    }

    fn detect_linux_family() -> Result<Self, crate::error::AgentError> {
        let os_release =
            std::fs::read_to_string("/etc/os-release").unwrap_or_default();
        let id_like = os_release
            .lines()
            .find_map(|line| line.strip_prefix("ID_LIKE=").or_else(|| line.strip_prefix("ID=")))
            .unwrap_or_default()
            .trim_matches('"')
            .to_lowercase();

        if id_like.contains("debian") || id_like.contains("ubuntu") {
            Ok(Platform::Debian)
        } else if id_like.contains("rhel")
            || id_like.contains("fedora")
            || id_like.contains("centos")
        {
            Ok(Platform::Rhel)
        } else {
            Err(crate::error::AgentError::UnsupportedPlatform)
        }
    }

    /// Maps `(request, source, package name)` to the argv of the native
    /// package manager. Returns `None` when the platform has no mapping for
    /// that combination (Darwin has no uninstall-from-file path).
    pub fn package_command(
        &self,
        request: PackageRequest,
        source: PackageSource,
        name: &str,
    ) -> Option<Vec<String>> {
        use PackageRequest::*;
        use PackageSource::*;

        let argv: Vec<&str> = match (self, request, source) {
            (Platform::Debian, Install, Internet) => vec!["apt-get", "install", "-y", name],
            (Platform::Debian, Install, File) => vec!["dpkg", "-i", name],
            (Platform::Debian, Uninstall, Internet) => vec!["apt-get", "remove", "-y", name],
            (Platform::Debian, Uninstall, File) => vec!["dpkg", "-r", name],

            (Platform::Rhel, Install, Internet) => vec!["yum", "install", "-y", name],
            (Platform::Rhel, Install, File) => vec!["rpm", "-i", name],
            (Platform::Rhel, Uninstall, Internet) => vec!["yum", "remove", "-y", name],
            (Platform::Rhel, Uninstall, File) => vec!["rpm", "-e", name],

            (Platform::Darwin, Install, Internet) => vec!["brew", "install", name],
            (Platform::Darwin, Install, File) => vec!["installer", "-pkg", name, "-target", "/"],
            (Platform::Darwin, Uninstall, Internet) => vec!["brew", "uninstall", name],
            (Platform::Darwin, Uninstall, File) => return None,

            (Platform::Windows, _, _) => return None,
        };

        Some(argv.into_iter().map(str::to_string).collect())
    }

    /// Returns the shell line used for the `reboot`/`shutdown`/`update` internal verbs.
    pub fn system_command(&self, verb: &str) -> Option<Vec<String>> {
        match (self, verb) {
            (Platform::Debian | Platform::Rhel, "reboot") => {
                Some(vec!["reboot".to_string()])
            }
            (Platform::Debian | Platform::Rhel, "shutdown") => {
                Some(vec!["shutdown".to_string(), "-h".to_string(), "now".to_string()])
            }
            (Platform::Debian, "update") => Some(vec![
                "apt-get".to_string(),
                "update".to_string(),
            ]),
            (Platform::Rhel, "update") => Some(vec!["yum".to_string(), "check-update".to_string()]),
            (Platform::Darwin, "reboot") => Some(vec!["shutdown".to_string(), "-r".to_string(), "now".to_string()]),
            (Platform::Darwin, "shutdown") => Some(vec!["shutdown".to_string(), "-h".to_string(), "now".to_string()]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn darwin_has_no_uninstall_from_file() {
        let cmd = Platform::Darwin.package_command(
            PackageRequest::Uninstall,
            PackageSource::File,
            "htop",
        );
        assert!(cmd.is_none());
    }

    #[test]
    fn debian_install_from_internet() {
        let cmd = Platform::Debian
            .package_command(PackageRequest::Install, PackageSource::Internet, "htop")
            .unwrap();
        assert_eq!(cmd, vec!["apt-get", "install", "-y", "htop"]);
    }

    #[test]
    fn windows_has_no_package_mapping() {
        assert!(Platform::Windows
            .package_command(PackageRequest::Install, PackageSource::Internet, "x")
            .is_none());
    }

    #[test]
    fn display_matches_config_vocabulary() {
        assert_eq!(Platform::Rhel.to_string(), "rhel");
    }
}
