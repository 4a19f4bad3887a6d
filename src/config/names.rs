//! File, directory and variable names shared across the crate

/// Package descriptor file name, searched recursively under the root
pub const DESCRIPTOR_FILE: &str = "build.json";

/// Ledger file name, stored in each package's context directory
pub const LEDGER_FILE: &str = "state.json";

/// Build directory name inside a package's context directory
pub const BUILD_SUBDIR: &str = "build";

/// Extraction target inside a package's context directory, renamed to
/// the build directory once the archive unpacked completely
pub const PARTIAL_BUILD_SUBDIR: &str = "build.partial";

/// Shared install directory name inside the destination
pub const INSTALL_SUBDIR: &str = "install";

/// Global config file name inside the config directory
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Variable naming the package context directory
pub const VAR_CONTEXT_DIR: &str = "AVBBS_CONTEXT_DIR";

/// Variable naming the directory commands run in
pub const VAR_BUILD_DIR: &str = "AVBBS_BUILD_DIR";

/// Variable naming the shared install directory
pub const VAR_INSTALL_DIR: &str = "AVBBS_INSTALL_DIR";

/// Variable naming the fetched source archive (empty without a source)
pub const VAR_SOURCE: &str = "AVBBS_SOURCE";

/// Variable carrying the target architecture
pub const VAR_ARCH: &str = "AVBBS_ARCH";

/// Variable carrying the target platform
pub const VAR_PLATFORM: &str = "AVBBS_PLATFORM";

/// Variable carrying the parallel job count hint
pub const VAR_JOBS: &str = "AVBBS_JOBS";
