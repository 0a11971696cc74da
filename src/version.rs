//! Library version information.

use std::fmt;

/// Semantic version of the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
  /// Major version.
  pub major: u32,
  /// Minor version.
  pub minor: u32,
  /// Patch version.
  pub patch: u32,
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

/// Version of this library build.
pub fn version() -> Version {
  Version {
    major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
    minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
    patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_version_matches_package() {
    assert_eq!(version().to_string(), env!("CARGO_PKG_VERSION"));
  }
}
