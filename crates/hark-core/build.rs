//! Rejects a broken embedded settings file at build time, so the
//! `settings()` singleton can rely on it.

const SETTINGS: &str = "src/default_settings.toml";

const SECTIONS: [&str; 5] = ["log_math", "active_list", "word_active_list", "search", "lattice"];

fn main() {
    println!("cargo:rerun-if-changed={SETTINGS}");
    check_settings(include_str!("src/default_settings.toml"));
}

fn check_settings(content: &str) {
    let value = match content.parse::<toml::Value>() {
        Ok(value) => value,
        Err(e) => panic!("{SETTINGS} contains invalid TOML: {e}"),
    };
    for section in SECTIONS {
        if !value.get(section).is_some_and(toml::Value::is_table) {
            panic!("{SETTINGS} is missing the [{section}] table");
        }
    }
}
