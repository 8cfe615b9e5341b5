fn main() {
    // コミット/チェックアウトで再実行
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let describe = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    println!(
        "cargo:rustc-env=GIT_VERSION={}",
        describe.unwrap_or_else(|| "dev".to_string())
    );
}
