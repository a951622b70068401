use std::process::Command;

fn rustc_version() -> String {
    match Command::new(std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_owned()))
        .arg("--version")
        .output()
    {
        Ok(result) => String::from_utf8_lossy(&result.stdout).trim().to_owned(),
        Err(_) => "unknown".to_owned(),
    }
}

fn main() {
    println!("cargo:rustc-env=RUSTC_VERSION={}", rustc_version());
    println!("cargo:rerun-if-changed=build.rs");
}
