/// Name used for cache directories and generated file headers.
pub const APP_NAME: &str = "depforge";

/// Schema version of the Build/Package/State layout.
///
/// A stored version different from this one discards everything but the
/// source tree of a dependency.
pub const STORAGE_VERSION: u32 = 1;

/// File listing accumulated package directories, one absolute path per line.
pub const MANIFEST_FILENAME: &str = "depforge-packages.txt";

/// Configuration used when a dependency names none.
pub const DEFAULT_CONFIGURATION: &str = "Release";

/// Descriptor file looked up by the CLI when none is given.
pub const DEFAULT_DEPS_FILE: &str = "deps.lua";

pub const ROOT_ENV: &str = "DEPFORGE_ROOT";
pub const FAST_MODE_ENV: &str = "DEPFORGE_FAST";
pub const OUTPUT_DIR_ENV: &str = "DEPFORGE_OUTPUT_DIR";
pub const CMAKE_ENV: &str = "DEPFORGE_CMAKE";
pub const GIT_ENV: &str = "DEPFORGE_GIT";
pub const PKG_CONFIG_ENV: &str = "DEPFORGE_PKG_CONFIG";
