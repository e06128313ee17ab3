const SETTINGS: &str = "src/default_settings.toml";
const SECTIONS: &[&str] = &["lexicon", "learning", "diversify"];

fn main() {
    println!("cargo:rerun-if-changed={SETTINGS}");
    check_settings(include_str!("src/default_settings.toml"));
}

/// The embedded defaults must parse and carry every component section.
fn check_settings(content: &str) {
    let doc = match content.parse::<toml::Value>() {
        Ok(doc) => doc,
        Err(e) => panic!("{SETTINGS} contains invalid TOML: {e}"),
    };
    for section in SECTIONS {
        if !doc.get(section).is_some_and(toml::Value::is_table) {
            panic!("{SETTINGS} is missing the [{section}] table");
        }
    }
}
