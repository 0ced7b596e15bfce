const fn unwrap_or_default(opt: Option<&'static str>, default: &'static str) -> &'static str {
    match opt {
        Some(val) => val,
        None => default,
    }
}

pub const VERSION: &str = unwrap_or_default(option_env!("APP_VERSION"), env!("CARGO_PKG_VERSION"));

pub const REVISION: &str = unwrap_or_default(option_env!("APP_REVISION"), "unknown");

/// User agent sent with every probe request.
pub fn user_agent() -> String {
    format!("Zatsu_Monitor/{VERSION}({REVISION})")
}

pub fn version_line() -> String {
    format!("zatsu_monitor {VERSION}, build {REVISION}")
}
