/// Tool name recorded in build configs and temp dir layouts.
pub const APP_NAME: &str = "twinbuild";

/// Number of hex characters kept from a compound ID digest.
pub const COMPOUND_ID_LEN: usize = 32;

/// File in the meta directory holding the executable's sha256.
pub const BIN_DIGEST_FILENAME: &str = "bin_digest";

/// File in the meta directory holding the archive's sha256.
pub const ZIP_DIGEST_FILENAME: &str = "zip_digest";

/// Prefix for the temp file the build instructions are written to.
pub const INSTRUCTIONS_FILE_PREFIX: &str = "twinbuild.instructions.";
