use std::fs;

use kotoba_core::settings;

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(settings::parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: lexicon.max_entries={}, learning.min_co_occurrence={}, diversify.quality_accept_at={}",
        s.lexicon.max_entries, s.learning.min_co_occurrence, s.diversify.quality_accept_at
    );
}

/// Install `file` as the process-wide settings. Must run before anything
/// reads a default config.
pub fn load_settings(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    die!(settings::init_custom(content), "Error in {file}: {}");
}
