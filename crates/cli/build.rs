use std::process::Command;

/// `git describe` of the checkout, or `REFSYNC_BUILD_COMMIT` for builds from
/// a source archive.
fn describe_commit() -> String {
    if let Ok(commit) = std::env::var("REFSYNC_BUILD_COMMIT") {
        return commit;
    }
    let Ok(output) = Command::new("git").args(["describe", "--always", "--dirty"]).output() else {
        return "unknown".into();
    };
    if !output.status.success() {
        return "unknown".into();
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn main() {
    println!("cargo:rerun-if-env-changed=REFSYNC_BUILD_COMMIT");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    println!("cargo:rustc-env=REFSYNC_COMMIT={}", describe_commit());
    println!(
        "cargo:rustc-env=REFSYNC_TARGET={}",
        std::env::var("TARGET").unwrap_or_else(|_| "unknown".into())
    );
}
