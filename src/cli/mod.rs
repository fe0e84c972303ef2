pub mod run;

/// Get version string with build details
pub fn version(name: &str) -> String {
    let build_type = if cfg!(debug_assertions) { "debug" } else { "release" };
    let target_env = if cfg!(target_env = "gnu") { "gnu" }
        else if cfg!(target_env = "musl") { "musl" }
        else { "unknown" };

    format!("{} {} {} {} {} {}",
        name,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        std::env::consts::OS,
        target_env,
        build_type,
    )
}
