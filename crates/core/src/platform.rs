//! Platform and architecture identification.
//!
//! Release assets are named `uv-<architecture>-<platform>`, e.g.
//! `uv-aarch64-apple-darwin.tar.gz`. Both halves are closed enums so an
//! unknown target is an error rather than a malformed URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// OS/ABI half of a target triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Linux with glibc
    #[serde(rename = "unknown-linux-gnu")]
    UnknownLinuxGnu,
    /// Linux with musl
    #[serde(rename = "unknown-linux-musl")]
    UnknownLinuxMusl,
    /// 32-bit ARM Linux with glibc, hard float
    #[serde(rename = "unknown-linux-gnueabihf")]
    UnknownLinuxGnueabihf,
    /// 32-bit ARM Linux with musl, hard float
    #[serde(rename = "unknown-linux-musleabihf")]
    UnknownLinuxMusleabihf,
    /// macOS
    #[serde(rename = "apple-darwin")]
    AppleDarwin,
    /// Windows with the MSVC toolchain
    #[serde(rename = "pc-windows-msvc")]
    PcWindowsMsvc,
}

impl Platform {
    /// All platforms with published releases.
    pub const ALL: [Self; 6] = [
        Self::UnknownLinuxGnu,
        Self::UnknownLinuxMusl,
        Self::UnknownLinuxGnueabihf,
        Self::UnknownLinuxMusleabihf,
        Self::AppleDarwin,
        Self::PcWindowsMsvc,
    ];

    /// Triple suffix used in asset names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownLinuxGnu => "unknown-linux-gnu",
            Self::UnknownLinuxMusl => "unknown-linux-musl",
            Self::UnknownLinuxGnueabihf => "unknown-linux-gnueabihf",
            Self::UnknownLinuxMusleabihf => "unknown-linux-musleabihf",
            Self::AppleDarwin => "apple-darwin",
            Self::PcWindowsMsvc => "pc-windows-msvc",
        }
    }

    /// Whether this is a Windows-class platform.
    #[must_use]
    pub fn is_windows(self) -> bool {
        matches!(self, Self::PcWindowsMsvc)
    }

    /// Archive format of the release asset for this platform.
    #[must_use]
    pub fn archive_format(self) -> ArchiveFormat {
        if self.is_windows() {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }

    /// File name of the tool's executable inside the archive.
    #[must_use]
    pub fn executable_name(self, tool: &str) -> String {
        if self.is_windows() {
            format!("{tool}.exe")
        } else {
            tool.to_string()
        }
    }

    /// Platform of the running host, if releases exist for it.
    #[must_use]
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::AppleDarwin)
        } else if cfg!(all(target_os = "windows", target_env = "msvc")) {
            Some(Self::PcWindowsMsvc)
        } else if cfg!(target_os = "linux") {
            let hard_float_arm = cfg!(all(target_arch = "arm", target_abi = "eabihf"));
            Some(match (cfg!(target_env = "musl"), hard_float_arm) {
                (false, false) => Self::UnknownLinuxGnu,
                (true, false) => Self::UnknownLinuxMusl,
                (false, true) => Self::UnknownLinuxGnueabihf,
                (true, true) => Self::UnknownLinuxMusleabihf,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::unsupported_platform(format!("unknown platform '{s}'")))
    }
}

/// CPU architecture half of a target triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// 64-bit x86
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM
    Aarch64,
    /// 32-bit x86
    I686,
    /// 32-bit ARMv7
    Armv7,
    /// 64-bit little-endian POWER
    Powerpc64le,
    /// 64-bit big-endian POWER
    Powerpc64,
    /// IBM Z
    S390x,
}

impl Architecture {
    /// All architectures with published releases.
    pub const ALL: [Self; 7] = [
        Self::X86_64,
        Self::Aarch64,
        Self::I686,
        Self::Armv7,
        Self::Powerpc64le,
        Self::Powerpc64,
        Self::S390x,
    ];

    /// Name used in asset names and cache keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::I686 => "i686",
            Self::Armv7 => "armv7",
            Self::Powerpc64le => "powerpc64le",
            Self::Powerpc64 => "powerpc64",
            Self::S390x => "s390x",
        }
    }

    /// Architecture of the running host, if releases exist for it.
    #[must_use]
    pub fn current() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Some(Self::X86_64),
            "aarch64" => Some(Self::Aarch64),
            "x86" => Some(Self::I686),
            "arm" => Some(Self::Armv7),
            "powerpc64" if cfg!(target_endian = "little") => Some(Self::Powerpc64le),
            "powerpc64" => Some(Self::Powerpc64),
            "s390x" => Some(Self::S390x),
            _ => None,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "i686" | "x86" => Ok(Self::I686),
            "armv7" => Ok(Self::Armv7),
            "powerpc64le" | "ppc64le" => Ok(Self::Powerpc64le),
            "powerpc64" | "ppc64" => Ok(Self::Powerpc64),
            "s390x" => Ok(Self::S390x),
            other => Err(Error::unsupported_platform(format!(
                "unknown architecture '{other}'"
            ))),
        }
    }
}

/// Archive container used by a release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// `.zip`, used for Windows-class platforms
    Zip,
    /// `.tar.gz`, used everywhere else
    TarGz,
}

impl ArchiveFormat {
    /// File name suffix including the leading dot.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
        }
    }
}

/// A validated (architecture, platform) pair with a published release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// CPU architecture
    pub architecture: Architecture,
    /// OS/ABI target
    pub platform: Platform,
}

impl ArtifactKey {
    /// Validate a pair against the release matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] when no asset is published for
    /// the combination.
    pub fn new(architecture: Architecture, platform: Platform) -> Result<Self> {
        use Architecture as A;
        use Platform as P;

        let published = match architecture {
            A::X86_64 | A::Aarch64 => matches!(
                platform,
                P::UnknownLinuxGnu | P::UnknownLinuxMusl | P::AppleDarwin | P::PcWindowsMsvc
            ),
            A::I686 => matches!(
                platform,
                P::UnknownLinuxGnu | P::UnknownLinuxMusl | P::PcWindowsMsvc
            ),
            A::Armv7 => matches!(platform, P::UnknownLinuxGnueabihf | P::UnknownLinuxMusleabihf),
            A::Powerpc64le | A::Powerpc64 | A::S390x => matches!(platform, P::UnknownLinuxGnu),
        };

        if published {
            Ok(Self {
                architecture,
                platform,
            })
        } else {
            Err(Error::unsupported_platform(format!(
                "no release asset for {architecture}-{platform}"
            )))
        }
    }

    /// Key for the running host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] when the host has no release.
    pub fn current() -> Result<Self> {
        let architecture = Architecture::current().ok_or_else(|| {
            Error::unsupported_platform(format!(
                "host architecture '{}'",
                std::env::consts::ARCH
            ))
        })?;
        let platform = Platform::current().ok_or_else(|| {
            Error::unsupported_platform(format!("host OS '{}'", std::env::consts::OS))
        })?;
        Self::new(architecture, platform)
    }

    /// Asset identifier: `<tool>-<architecture>-<platform>`.
    #[must_use]
    pub fn artifact_name(&self, tool: &str) -> String {
        format!("{tool}-{}-{}", self.architecture, self.platform)
    }

    /// Asset file name including the archive suffix.
    #[must_use]
    pub fn asset_file_name(&self, tool: &str) -> String {
        format!(
            "{}{}",
            self.artifact_name(tool),
            self.platform.archive_format().suffix()
        )
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.architecture, self.platform)
    }
}
