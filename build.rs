use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::{env, fs};

static CONFIGS: &[(&str, usize)] = &[
    // name, default value
    ("ACTIVATION_SPACING_MS", 500),
    ("MAX_ADVERTISING_SETS", 4),
    ("DISPATCH_QUEUE_SIZE", 16),
    ("EVENT_CHANNEL_SIZE", 8),
];

struct ConfigState {
    value: usize,
    seen_env: bool,
}

fn main() {
    let crate_name = env::var("CARGO_PKG_NAME")
        .unwrap()
        .to_ascii_uppercase()
        .replace('-', "_");

    // only rebuild if build.rs changed. Otherwise Cargo will rebuild if any
    // other file changed.
    println!("cargo:rerun-if-changed=build.rs");

    let mut configs = HashMap::new();
    for (name, default) in CONFIGS {
        configs.insert(
            *name,
            ConfigState {
                value: *default,
                seen_env: false,
            },
        );
    }

    let prefix = format!("{crate_name}_");
    for (var, value) in env::vars() {
        if let Some(name) = var.strip_prefix(&prefix) {
            let Some(cfg) = configs.get_mut(name) else {
                panic!("Unknown env var {var}")
            };

            let Ok(value) = value.parse::<usize>() else {
                panic!("Invalid value for env var {var}: {value}")
            };

            cfg.value = value;
            cfg.seen_env = true;
        }
    }

    for name in configs.keys() {
        println!("cargo:rerun-if-env-changed={crate_name}_{name}");
    }

    let mut data = String::new();

    for (name, cfg) in &configs {
        writeln!(&mut data, "pub const {}: usize = {};", name, cfg.value).unwrap();
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    let out_file = out_dir.join("config.rs").to_string_lossy().to_string();
    fs::write(out_file, data).unwrap();
}
