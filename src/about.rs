/// Version string shown in the window header and by `--version`.
pub const GUI_VERSION: &str = "mvp-0.26.8";
pub const BUILD_N: &str = env!("VIRALFLOW_GUI_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "ViralFlow GUI {}\nBuild {}\nConfigure and launch ViralFlow runs (simulated MVP)",
        GUI_VERSION, BUILD_N
    )
}
