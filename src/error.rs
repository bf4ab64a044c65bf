use pingora::ErrorType;

/// The certificate store is missing, not accessible or unreadable.
pub const STORE_ACCESS_ERROR: ErrorType = ErrorType::Custom("StoreAccessError");

/// A PFX/PKCS#12 bundle could not be read or decoded.
pub const PFX_DECODE_ERROR: ErrorType = ErrorType::Custom("PfxDecodeError");

/// No site matches the requested name.
pub const SITE_NOT_FOUND_ERROR: ErrorType = ErrorType::Custom("SiteNotFoundError");

/// The server configuration rejected a binding information string.
pub const BINDING_FORMAT_ERROR: ErrorType = ErrorType::Custom("BindingFormatError");

/// Persisting staged server configuration changes failed.
pub const COMMIT_ERROR: ErrorType = ErrorType::Custom("CommitError");

/// The server configuration could not be loaded.
pub const SERVER_CONFIG_ERROR: ErrorType = ErrorType::Custom("ServerConfigError");
