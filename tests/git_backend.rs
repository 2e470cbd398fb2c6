//! GitCli against real repositories
//!
//! Skipped when `git` is not installed.

use repo_publisher::backends::GitCli;
use repo_publisher::core::traits::{NetworkAuth, VersionControl};
use repo_publisher::pipeline::{BranchAction, BranchNormalizer};
use repo_publisher::security::{SafeCommandExecutor, SensitiveFileGuard, SensitivePathSet};
use secrecy::SecretString;
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Publisher Test"]);
    git(dir, &["config", "user.email", "publisher@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Repository on `master` with an identity configured
fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    configure_identity(dir);
}

fn commit_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
    git(dir, &["add", name]);
    git(dir, &["commit", "-q", "-m", name]);
}

fn backend(dir: &Path) -> GitCli {
    GitCli::new(SafeCommandExecutor::new(dir).unwrap())
}

#[tokio::test]
async fn test_unborn_repository_converges_on_main() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let vcs = backend(temp_dir.path());

    assert!(!vcs.is_repository().await.unwrap());
    vcs.init().await.unwrap();
    git(temp_dir.path(), &["symbolic-ref", "HEAD", "refs/heads/master"]);

    let outcome = BranchNormalizer::new(&vcs).normalize().await.unwrap();

    assert!(matches!(outcome.action, BranchAction::PointedHead { .. }));
    assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("main"));
    assert!(!vcs.has_commits().await.unwrap());
}

#[tokio::test]
async fn test_branch_with_history_is_renamed_once() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    init_repo(temp_dir.path());
    commit_file(temp_dir.path(), "manifest.json", "{}");
    let head = git(temp_dir.path(), &["rev-parse", "HEAD"]);
    let vcs = backend(temp_dir.path());

    let first = BranchNormalizer::new(&vcs).normalize().await.unwrap();
    let second = BranchNormalizer::new(&vcs).normalize().await.unwrap();

    assert_eq!(
        first.action,
        BranchAction::Renamed {
            from: "master".to_string()
        }
    );
    assert_eq!(second.action, BranchAction::AlreadyCanonical);
    assert_eq!(git(temp_dir.path(), &["rev-parse", "main"]), head);
}

#[tokio::test]
async fn test_detached_head_with_history_lands_on_main() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    commit_file(dir, "manifest.json", "{}");
    commit_file(dir, "background.js", "// v1\n");
    let head = git(dir, &["rev-parse", "HEAD"]);
    git(dir, &["checkout", "-q", "--detach"]);
    git(dir, &["branch", "-q", "-D", "master"]);
    let vcs = backend(dir);

    let outcome = BranchNormalizer::new(&vcs).normalize().await.unwrap();

    assert_eq!(outcome.action, BranchAction::Attached);
    assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("main"));
    assert!(vcs.has_commits().await.unwrap());
    assert_eq!(git(dir, &["rev-parse", "main"]), head);
    assert_eq!(git(dir, &["rev-list", "--count", "HEAD"]), "2");
}

#[tokio::test]
async fn test_detached_head_fast_forwards_stale_main() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    commit_file(dir, "manifest.json", "{}");
    git(dir, &["branch", "main"]);
    commit_file(dir, "background.js", "// v2\n");
    let head = git(dir, &["rev-parse", "HEAD"]);
    git(dir, &["checkout", "-q", "--detach"]);
    let vcs = backend(dir);

    let outcome = BranchNormalizer::new(&vcs).normalize().await.unwrap();

    assert_eq!(outcome.action, BranchAction::Attached);
    assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("main"));
    assert_eq!(git(dir, &["rev-parse", "main"]), head);
}

#[tokio::test]
async fn test_detached_head_refuses_diverged_main() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    commit_file(dir, "manifest.json", "{}");
    git(dir, &["checkout", "-q", "-b", "main"]);
    commit_file(dir, "background.js", "// only on main\n");
    let main_tip = git(dir, &["rev-parse", "main"]);
    git(dir, &["checkout", "-q", "--detach", "master"]);
    let detached = git(dir, &["rev-parse", "HEAD"]);
    let vcs = backend(dir);

    let err = BranchNormalizer::new(&vcs).normalize().await.unwrap_err();

    assert_eq!(err.code(), "BRANCH_CONFLICT");
    assert_eq!(git(dir, &["rev-parse", "main"]), main_tip);
    assert_eq!(git(dir, &["rev-parse", "HEAD"]), detached);
    assert_eq!(vcs.current_branch().await.unwrap(), None);
}

#[tokio::test]
async fn test_rename_onto_existing_main_is_a_conflict() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    commit_file(dir, "manifest.json", "{}");
    git(dir, &["branch", "main"]);
    let vcs = backend(dir);

    let err = BranchNormalizer::new(&vcs).normalize().await.unwrap_err();

    assert_eq!(err.code(), "BRANCH_CONFLICT");
    assert!(err.to_string().contains("master"));
    assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("master"));
}

#[tokio::test]
async fn test_sensitive_paths_are_never_staged() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    // An earlier manual commit tracked the token file
    commit_file(dir, "github_token.txt", "ghp_previously_committed");
    std::fs::write(dir.join("manifest.json"), "{}").unwrap();
    std::fs::write(dir.join("publish.sh"), "#!/bin/sh\n").unwrap();
    std::fs::write(dir.join("amo_api_key.txt"), "user:1:2\n").unwrap();

    let vcs = backend(dir);
    let set = SensitivePathSet::new("publish.sh");
    let guard = SensitiveFileGuard::new(&set);

    let first = guard.stage(&vcs).await.unwrap();
    let second = guard.stage(&vcs).await.unwrap();

    assert_eq!(first, second);
    assert!(first.contains(&"manifest.json".to_string()));
    for path in set.paths() {
        assert!(!vcs.is_tracked(path).await.unwrap(), "{path} is tracked");
    }
    assert!(dir.join("github_token.txt").exists(), "working file kept");

    // Only the removal of the token file is staged, never its content
    let staged_files = git(dir, &["diff", "--cached", "--name-status"]);
    assert!(staged_files.lines().any(|l| l == "D\tgithub_token.txt"));
    assert!(!staged_files.contains("publish.sh"));
    assert!(!staged_files.contains("amo_api_key.txt"));
}

#[tokio::test]
async fn test_sensitive_paths_kept_out_of_first_commit() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    std::fs::write(dir.join("manifest.json"), "{}").unwrap();
    std::fs::write(dir.join("publish.sh"), "#!/bin/sh\n").unwrap();
    std::fs::write(dir.join("github_token.txt"), "ghp_unborn\n").unwrap();

    let vcs = backend(dir);
    let set = SensitivePathSet::new("publish.sh");
    let staged = SensitiveFileGuard::new(&set).stage(&vcs).await.unwrap();

    assert_eq!(staged, vec!["manifest.json"]);
    assert!(!vcs.has_commits().await.unwrap());
}

#[tokio::test]
async fn test_staged_paths_empty_after_commit() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    init_repo(temp_dir.path());
    std::fs::write(temp_dir.path().join("manifest.json"), "{}").unwrap();
    let vcs = backend(temp_dir.path());

    vcs.stage_all().await.unwrap();
    assert_eq!(vcs.staged_paths().await.unwrap(), vec!["manifest.json"]);

    vcs.commit("Publish update").await.unwrap();
    vcs.stage_all().await.unwrap();
    assert!(vcs.staged_paths().await.unwrap().is_empty());
    assert!(vcs.has_commits().await.unwrap());
    assert!(!vcs.has_upstream().await.unwrap());
}

/// Bare remote with `main` holding one commit, plus a clone of it
fn remote_and_clone(root: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let remote = root.join("remote.git");
    let seed = root.join("seed");
    let local = root.join("local");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&seed).unwrap();

    git(&remote, &["init", "-q", "--bare"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    git(&seed, &["init", "-q"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    configure_identity(&seed);
    commit_file(&seed, "manifest.json", "base\n");
    git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&seed, &["push", "-q", "origin", "main"]);

    git(root, &["clone", "-q", remote.to_str().unwrap(), local.to_str().unwrap()]);
    configure_identity(&local);

    (seed, local)
}

fn askpass_leftovers() -> HashSet<String> {
    std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("repo-publisher-askpass-"))
        .collect()
}

#[tokio::test]
async fn test_token_push_records_upstream_and_cleans_up() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let (_seed, local) = remote_and_clone(temp_dir.path());
    let remote = temp_dir.path().join("remote.git");
    git(&local, &["branch", "--unset-upstream"]);
    commit_file(&local, "background.js", "// local change\n");
    let head = git(&local, &["rev-parse", "HEAD"]);

    let vcs = backend(&local);
    let auth = NetworkAuth::Token {
        username: "octo".to_string(),
        token: SecretString::from("ghp_pushTokenValue1234"),
    };
    let before = askpass_leftovers();
    assert!(!vcs.has_upstream().await.unwrap());

    vcs.push("origin", "main", &auth).await.unwrap();
    assert!(vcs.has_upstream().await.unwrap());
    assert_eq!(git(&remote, &["rev-parse", "main"]), head);

    // Nothing new to send
    vcs.push("origin", "main", &auth).await.unwrap();

    let after = askpass_leftovers();
    assert!(after.is_subset(&before), "leftover responders: {:?}", after);
}

#[tokio::test]
async fn test_amend_rewrites_tip_of_existing_history() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    init_repo(dir);
    commit_file(dir, "background.js", "// base\n");
    std::fs::write(dir.join("manifest.json"), "{\"version\": \"1.0\"}").unwrap();
    let vcs = backend(dir);

    vcs.stage_all().await.unwrap();
    vcs.commit("Publish update").await.unwrap();
    assert_eq!(git(dir, &["rev-list", "--count", "HEAD"]), "2");

    std::fs::write(dir.join("manifest.json"), "{\"version\": \"1.1\"}").unwrap();
    vcs.stage_all().await.unwrap();
    vcs.amend("Publish update").await.unwrap();

    assert_eq!(git(dir, &["rev-list", "--count", "HEAD"]), "2");
    assert_eq!(
        git(dir, &["show", "HEAD:manifest.json"]),
        "{\"version\": \"1.1\"}"
    );
    assert!(vcs.staged_paths().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_branch_detection() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let (_seed, local) = remote_and_clone(temp_dir.path());
    let vcs = backend(&local);

    assert!(vcs
        .remote_branch_exists("origin", "main", &NetworkAuth::Transport)
        .await
        .unwrap());
    assert!(!vcs
        .remote_branch_exists("origin", "gh-pages", &NetworkAuth::Transport)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_clean_pull_then_upstream_is_recorded() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let (seed, local) = remote_and_clone(temp_dir.path());
    commit_file(&seed, "background.js", "remote change\n");
    git(&seed, &["push", "-q", "origin", "main"]);

    let vcs = backend(&local);
    vcs.pull_rebase("origin", "main", &NetworkAuth::Transport)
        .await
        .unwrap();
    vcs.set_upstream("origin", "main").await.unwrap();

    assert!(local.join("background.js").exists());
    assert!(vcs.has_upstream().await.unwrap());
}

#[tokio::test]
async fn test_conflicting_pull_restores_branch() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let (seed, local) = remote_and_clone(temp_dir.path());

    commit_file(&seed, "manifest.json", "remote\n");
    git(&seed, &["push", "-q", "origin", "main"]);
    commit_file(&local, "manifest.json", "local\n");
    let before = git(&local, &["rev-parse", "HEAD"]);

    let vcs = backend(&local);
    let err = vcs
        .pull_rebase("origin", "main", &NetworkAuth::Transport)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RECONCILIATION_CONFLICT");
    assert_eq!(git(&local, &["rev-parse", "HEAD"]), before);
    assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("main"));
    assert!(!local.join(".git/rebase-merge").exists());
    assert!(!local.join(".git/rebase-apply").exists());
    assert_eq!(
        std::fs::read_to_string(local.join("manifest.json")).unwrap(),
        "local\n"
    );
}

#[tokio::test]
async fn test_existing_remote_url_is_read_back() {
    if !git_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    init_repo(temp_dir.path());
    let vcs = backend(temp_dir.path());

    assert_eq!(vcs.remote_url("origin").await.unwrap(), None);
    vcs.add_remote("origin", "https://github.com/octo/addon.git")
        .await
        .unwrap();
    assert_eq!(
        vcs.remote_url("origin").await.unwrap().as_deref(),
        Some("https://github.com/octo/addon.git")
    );
}
