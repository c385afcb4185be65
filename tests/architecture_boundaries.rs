use std::fs;
use std::path::{Path, PathBuf};

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

/// Files outside `allowed` whose non-comment lines contain `needle`
fn offenders(needle: &str, allowed: &[&str]) -> Vec<String> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&repo_root.join("src"), &mut files);

    let mut found = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        if allowed.contains(&rel.as_str()) {
            continue;
        }
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") {
                continue;
            }
            if trimmed.contains(needle) {
                found.push(format!("{}:{}", rel, idx + 1));
            }
        }
    }
    found
}

#[test]
fn transactions_are_only_broadcast_by_the_router() {
    let found = offenders("self.chain.send(", &["src/execution/router.rs"]);
    assert!(
        found.is_empty(),
        "chain sends outside the execution router:\n{}",
        found.join("\n")
    );
}

#[test]
fn only_settlement_commits_to_the_ledger() {
    let found = offenders(
        "self.ledger.commit_settlement(",
        &["src/settlement/service.rs"],
    );
    assert!(
        found.is_empty(),
        "ledger commits outside settlement:\n{}",
        found.join("\n")
    );
}

#[test]
fn risk_guard_does_not_touch_the_chain() {
    let found = offenders("ChainClient", &[])
        .into_iter()
        .filter(|loc| loc.starts_with("src/risk/"))
        .collect::<Vec<_>>();
    assert!(found.is_empty(), "risk guard depends on chain:\n{}", found.join("\n"));
}
