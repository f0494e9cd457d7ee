//! Optional accelerated strategies and their native backends
//!
//! Some query strategies need a BLAS/LAPACK backend at runtime. Availability is
//! detected once and passed around explicitly as [`OptionalFeatures`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use libloading::Library;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A strategy that is only usable when its native backend is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalFeature {
    VarianceReduction,
    #[serde(rename = "hintsvm")]
    HintSvm,
}

impl OptionalFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VarianceReduction => "variance_reduction",
            Self::HintSvm => "hintsvm",
        }
    }

    pub fn all() -> &'static [OptionalFeature] {
        &[Self::VarianceReduction, Self::HintSvm]
    }
}

impl fmt::Display for OptionalFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionalFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("Unknown optional feature: {s}"))
    }
}

#[cfg(target_os = "linux")]
const BLAS_CANDIDATES: &[&str] = &["libopenblas.so.0", "libopenblas.so", "libblas.so.3"];
#[cfg(target_os = "linux")]
const LAPACK_CANDIDATES: &[&str] = &["liblapacke.so.3", "liblapacke.so", "liblapack.so.3"];

#[cfg(target_os = "macos")]
const BLAS_CANDIDATES: &[&str] = &[
    "libopenblas.dylib",
    "/opt/homebrew/opt/openblas/lib/libopenblas.dylib",
    "/usr/local/opt/openblas/lib/libopenblas.dylib",
    "/System/Library/Frameworks/Accelerate.framework/Accelerate",
];
#[cfg(target_os = "macos")]
const LAPACK_CANDIDATES: &[&str] = BLAS_CANDIDATES;

#[cfg(target_os = "windows")]
const BLAS_CANDIDATES: &[&str] = &["libopenblas.dll", "openblas.dll", "mkl_rt.dll"];
#[cfg(target_os = "windows")]
const LAPACK_CANDIDATES: &[&str] = &["libopenblas.dll", "liblapack.dll", "mkl_rt.dll"];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const BLAS_CANDIDATES: &[&str] = &[];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LAPACK_CANDIDATES: &[&str] = &[];

/// Availability of each optional feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalFeatures {
    features: BTreeMap<OptionalFeature, bool>,
}

impl OptionalFeatures {
    /// Look on the platform for a BLAS/LAPACK backend
    pub fn detect() -> Self {
        let blas = find_library(BLAS_CANDIDATES);
        let lapack = find_library(LAPACK_CANDIDATES);
        let available = blas.is_some() && lapack.is_some();
        debug!(?blas, ?lapack, available, "native backend detection");
        Self::all_set(available)
    }

    /// Nothing optional is available
    pub fn none() -> Self {
        Self::all_set(false)
    }

    fn all_set(available: bool) -> Self {
        Self {
            features: OptionalFeature::all()
                .iter()
                .map(|f| (*f, available))
                .collect(),
        }
    }

    /// Override one feature's availability
    pub fn with(mut self, feature: OptionalFeature, available: bool) -> Self {
        self.features.insert(feature, available);
        self
    }

    pub fn is_available(&self, feature: OptionalFeature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    pub fn all_available(&self) -> bool {
        self.features.values().all(|available| *available)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionalFeature, bool)> + '_ {
        self.features.iter().map(|(f, available)| (*f, *available))
    }

    /// Human-readable status, with install instructions when something is missing
    pub fn report(&self) -> String {
        let rule = "=".repeat(40);
        let mut out = format!("Optional features\n{rule}\n");
        for (feature, available) in self.iter() {
            let status = if available { "available" } else { "not available" };
            out.push_str(&format!("  {feature}: {status}\n"));
        }
        out.push_str(&rule);
        out.push('\n');
        if !self.all_available() {
            out.push_str("\nTo enable missing features, install BLAS/LAPACK libraries:\n");
            out.push_str(&install_hint());
            out.push('\n');
        }
        out
    }
}

impl Default for OptionalFeatures {
    fn default() -> Self {
        Self::none()
    }
}

/// First candidate library that loads
fn find_library(candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|name| {
        // SAFETY: only system BLAS/LAPACK libraries are loaded, and the handle
        // is dropped without resolving any symbols.
        let library = unsafe { Library::new(name) };
        match library {
            Ok(_) => Some(name.to_string()),
            Err(e) => {
                debug!(library = name, error = %e, "backend candidate not loadable");
                None
            }
        }
    })
}

/// Platform-specific instructions for installing the native backend
pub fn install_hint() -> String {
    if cfg!(target_os = "linux") {
        "On Debian/Ubuntu: sudo apt-get install libopenblas-dev liblapacke-dev\n\
         On Fedora/RHEL: sudo dnf install openblas-devel lapack-devel\n\
         On Arch Linux: sudo pacman -S openblas lapacke"
            .to_string()
    } else if cfg!(target_os = "macos") {
        "On macOS: brew install openblas\n\
         Or rely on the Accelerate framework shipped with the OS"
            .to_string()
    } else if cfg!(target_os = "windows") {
        "On Windows, BLAS/LAPACK support requires additional setup.\n\
         Options:\n  \
         1. Use conda: conda install -c conda-forge openblas\n  \
         2. Install Intel MKL and add mkl_rt.dll to PATH"
            .to_string()
    } else {
        "Please install BLAS/LAPACK libraries for your platform.".to_string()
    }
}
