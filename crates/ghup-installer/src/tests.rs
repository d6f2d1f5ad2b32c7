use super::*;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use ghup_core::{InstalledState, InstalledVersion, Version};

use crate::host::effective_uid;

#[derive(Default)]
struct FakeHost {
    present: RefCell<BTreeSet<String>>,
    calls: RefCell<Vec<String>>,
    scripted: RefCell<Vec<(String, CommandOutcome)>>,
    provides: RefCell<Vec<(String, Vec<String>)>>,
    launch_failures: RefCell<BTreeSet<String>>,
}

impl FakeHost {
    fn with_tools(tools: &[&str]) -> Self {
        let host = Self::default();
        for tool in tools {
            host.present.borrow_mut().insert(tool.to_string());
        }
        host
    }

    /// The next call whose command line starts with `prefix` gets `outcome`.
    fn respond(&self, prefix: &str, outcome: CommandOutcome) {
        self.scripted
            .borrow_mut()
            .push((prefix.to_string(), outcome));
    }

    /// A successful call starting with `prefix` puts `tools` on PATH.
    fn provide_on_success(&self, prefix: &str, tools: &[&str]) {
        self.provides.borrow_mut().push((
            prefix.to_string(),
            tools.iter().map(|tool| tool.to_string()).collect(),
        ));
    }

    fn fail_launch(&self, program: &str) {
        self.launch_failures
            .borrow_mut()
            .insert(program.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn host(&self, escalation: Escalation) -> Host<'_> {
        Host::new(self, self, escalation)
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutcome> {
        let line = invocation.command_line();
        self.calls.borrow_mut().push(line.clone());
        if self.launch_failures.borrow().contains(&invocation.program) {
            return Err(anyhow!("No such file or directory (os error 2)"));
        }

        let outcome = {
            let mut scripted = self.scripted.borrow_mut();
            match scripted.iter().position(|(prefix, _)| line.starts_with(prefix)) {
                Some(index) => scripted.remove(index).1,
                None => ok_outcome(""),
            }
        };

        if outcome.success {
            for (prefix, tools) in self.provides.borrow().iter() {
                if line.starts_with(prefix) {
                    self.present.borrow_mut().extend(tools.iter().cloned());
                }
            }
        }
        Ok(outcome)
    }
}

impl ToolProbe for FakeHost {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        self.present
            .borrow()
            .contains(tool)
            .then(|| PathBuf::from("/usr/bin").join(tool))
    }
}

fn ok_outcome(stdout: &str) -> CommandOutcome {
    CommandOutcome {
        success: true,
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failed_outcome(code: i32, stderr: &str) -> CommandOutcome {
    CommandOutcome {
        success: false,
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

const DEPENDENCY_PROBLEMS: &str = "dpkg: dependency problems prevent configuration of gh:\n gh depends on git; however:\n  Package git is not installed.";

struct ScriptedDownloader {
    payload: Option<Vec<u8>>,
    checksums: Option<String>,
    interrupt: Option<CleanupSlot>,
    downloads: RefCell<Vec<(String, PathBuf)>>,
    workspace_existed: Cell<bool>,
}

impl ScriptedDownloader {
    fn serving(payload: &[u8]) -> Self {
        Self {
            payload: Some(payload.to_vec()),
            checksums: None,
            interrupt: None,
            downloads: RefCell::new(Vec::new()),
            workspace_existed: Cell::new(false),
        }
    }

    fn not_found() -> Self {
        Self {
            payload: None,
            ..Self::serving(b"")
        }
    }

    fn with_checksums(mut self, listing: &str) -> Self {
        self.checksums = Some(listing.to_string());
        self
    }

    /// Simulates the interrupt handler firing while the transfer is running.
    fn interrupted_by(slot: &CleanupSlot) -> Self {
        Self {
            interrupt: Some(slot.clone()),
            ..Self::serving(b"partial")
        }
    }

    fn downloaded_to(&self) -> Option<PathBuf> {
        self.downloads.borrow().first().map(|(_, path)| path.clone())
    }
}

impl Downloader for ScriptedDownloader {
    fn download(&self, url: &str, destination: &Path) -> anyhow::Result<()> {
        self.downloads
            .borrow_mut()
            .push((url.to_string(), destination.to_path_buf()));
        let parent = destination.parent().expect("download target has a parent");
        self.workspace_existed.set(parent.is_dir());

        if let Some(slot) = &self.interrupt {
            fs::write(destination.with_extension("deb.part"), b"partial")
                .expect("must write partial file");
            slot.release_now();
            return Err(anyhow!("transfer interrupted while reading response body"));
        }

        match &self.payload {
            Some(payload) => {
                fs::write(destination, payload).expect("must write artifact");
                Ok(())
            }
            None => Err(anyhow!("GET {url} returned HTTP 404 Not Found")),
        }
    }

    fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        self.checksums
            .clone()
            .ok_or_else(|| anyhow!("GET {url} returned HTTP 404 Not Found"))
    }
}

fn scratch_dir(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    std::env::temp_dir().join(format!("ghup-installer-tests-{label}-{nanos}"))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn request<'a>(version: &'a Version, parent: &'a Path, verify_checksums: bool) -> InstallRequest<'a> {
    InstallRequest {
        version,
        arch: "amd64",
        download_base_url: "https://github.com/cli/cli/releases/download",
        verify_checksums,
        workspace_parent: parent,
    }
}

fn workspace_entries(parent: &Path) -> Vec<PathBuf> {
    match fs::read_dir(parent) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn audit_with_all_tools_present_has_no_side_effects() {
    let fake = FakeHost::with_tools(&["gpg", "update-ca-certificates", "dpkg-deb"]);
    let report = audit_dependencies(
        &fake.host(Escalation::Direct),
        &strings(&["gpg", "update-ca-certificates", "dpkg-deb"]),
        &BTreeMap::new(),
    )
    .expect("audit must pass");

    assert_eq!(report.status, AuditStatus::AllPresent);
    assert!(report.missing.is_empty());
    assert!(fake.calls().is_empty());
}

#[test]
fn audit_refreshes_index_then_installs_mapped_packages() {
    let fake = FakeHost::with_tools(&["dpkg-deb"]);
    fake.provide_on_success("apt-get install", &["gpg", "update-ca-certificates"]);

    let report = audit_dependencies(
        &fake.host(Escalation::Direct),
        &strings(&["gpg", "update-ca-certificates", "dpkg-deb"]),
        &BTreeMap::new(),
    )
    .expect("remediation must succeed");

    assert_eq!(report.status, AuditStatus::Remediated);
    assert_eq!(report.missing, strings(&["gpg", "update-ca-certificates"]));
    assert_eq!(
        report.installed_packages,
        strings(&["gnupg", "ca-certificates"])
    );
    assert_eq!(
        fake.calls(),
        strings(&["apt-get update", "apt-get install -y gnupg ca-certificates"])
    );
}

#[test]
fn audit_escalates_remediation_through_sudo() {
    let fake = FakeHost::default();
    fake.provide_on_success("sudo apt-get install", &["jq"]);

    audit_dependencies(
        &fake.host(Escalation::Sudo),
        &strings(&["jq"]),
        &BTreeMap::new(),
    )
    .expect("remediation must succeed");

    assert_eq!(
        fake.calls(),
        strings(&["sudo apt-get update", "sudo apt-get install -y jq"])
    );
}

#[test]
fn audit_index_refresh_failure_is_fatal_with_manual_command() {
    let fake = FakeHost::default();
    fake.respond(
        "apt-get update",
        failed_outcome(100, "E: Could not open lock file /var/lib/apt/lists/lock"),
    );

    let err = audit_dependencies(
        &fake.host(Escalation::Sudo),
        &strings(&["gpg"]),
        &BTreeMap::new(),
    )
    .expect_err("refresh failure must be fatal");

    let message = err.to_string();
    assert!(message.starts_with("dependency-remediation-failed:"));
    assert!(message.contains("sudo apt-get update && sudo apt-get install -y gnupg"));
    assert!(message.contains("status 100"));
    assert_eq!(fake.calls(), strings(&["sudo apt-get update"]));
}

#[test]
fn audit_install_failure_is_fatal() {
    let fake = FakeHost::default();
    fake.respond(
        "apt-get install",
        failed_outcome(100, "E: Unable to locate package gnupg"),
    );

    let err = audit_dependencies(
        &fake.host(Escalation::Direct),
        &strings(&["gpg"]),
        &BTreeMap::new(),
    )
    .expect_err("install failure must be fatal");

    assert!(err.to_string().contains("Unable to locate package gnupg"));
    assert_eq!(fake.calls().len(), 2);
}

#[test]
fn audit_reprobes_and_fails_when_tool_still_missing() {
    let fake = FakeHost::default();
    fake.provide_on_success("apt-get install", &["gpg"]);

    let err = audit_dependencies(
        &fake.host(Escalation::Direct),
        &strings(&["gpg", "update-ca-certificates"]),
        &BTreeMap::new(),
    )
    .expect_err("tool still missing must be fatal");

    let message = err.to_string();
    assert!(message.starts_with("dependency-remediation-failed:"));
    assert!(message.contains("still missing"));
    assert!(message.contains("update-ca-certificates"));
    assert_eq!(fake.calls().len(), 2, "no retry after the single attempt");
}

#[test]
fn package_overrides_win_and_duplicates_collapse() {
    let mut overrides = BTreeMap::new();
    overrides.insert("gpg".to_string(), "gpg-lite".to_string());
    overrides.insert("gpgv".to_string(), "gpg-lite".to_string());
    assert_eq!(package_name_for("gpg", &overrides), "gpg-lite");
    assert_eq!(package_name_for("dpkg-deb", &overrides), "dpkg");
    assert_eq!(package_name_for("curl", &overrides), "curl");

    let fake = FakeHost::default();
    fake.provide_on_success("apt-get install", &["gpg", "gpgv"]);
    let report = audit_dependencies(
        &fake.host(Escalation::Direct),
        &strings(&["gpg", "gpgv"]),
        &overrides,
    )
    .expect("remediation must succeed");
    assert_eq!(report.installed_packages, strings(&["gpg-lite"]));
}

#[test]
fn detect_reports_not_installed_without_running_anything() {
    let fake = FakeHost::default();
    assert_eq!(
        detect_installed(&fake.host(Escalation::Direct)),
        InstalledState::NotInstalled
    );
    assert!(fake.calls().is_empty());
}

#[test]
fn detect_parses_self_reported_version() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond(
        "gh --version",
        ok_outcome("gh version 2.40.1 (2023-12-13)\nhttps://github.com/cli/cli/releases/tag/v2.40.1\n"),
    );
    assert_eq!(
        detect_installed(&fake.host(Escalation::Direct)),
        InstalledState::InstalledAt(InstalledVersion::Known(Version::new(2, 40, 1)))
    );
    assert_eq!(fake.calls(), strings(&["gh --version"]));
}

#[test]
fn detect_degrades_to_unknown_for_unparseable_output() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("gh --version", ok_outcome("gh version DEV\n"));
    assert_eq!(
        detect_installed(&fake.host(Escalation::Direct)),
        InstalledState::InstalledAt(InstalledVersion::Unknown)
    );
}

#[test]
fn detect_degrades_to_unknown_when_version_command_fails() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("gh --version", failed_outcome(1, "segmentation fault"));
    assert_eq!(
        detect_installed(&fake.host(Escalation::Direct)),
        InstalledState::InstalledAt(InstalledVersion::Unknown)
    );

    let broken = FakeHost::with_tools(&["gh"]);
    broken.fail_launch("gh");
    assert_eq!(
        detect_installed(&broken.host(Escalation::Direct)),
        InstalledState::InstalledAt(InstalledVersion::Unknown)
    );
}

#[test]
fn detect_never_escalates_version_probe() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("gh --version", ok_outcome("gh version 2.40.1 (2023-12-13)\n"));
    detect_installed(&fake.host(Escalation::Sudo));
    assert_eq!(fake.calls(), strings(&["gh --version"]));
}

#[test]
fn workspace_release_removes_directory_once() {
    let parent = scratch_dir("workspace");
    let slot = CleanupSlot::new();
    let workspace = Workspace::acquire(&parent, &slot).expect("must acquire workspace");
    let dir = workspace.path().to_path_buf();
    fs::write(dir.join("artifact.deb"), b"payload").expect("must write artifact");
    assert!(slot.is_armed());
    assert_eq!(slot.armed_path().as_deref(), Some(dir.as_path()));

    workspace.release();
    assert!(!dir.exists());
    assert!(!slot.is_armed());
    assert_eq!(slot.releases(), 1);

    assert!(!slot.release_now(), "second release must be a no-op");
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn release_now_without_workspace_is_noop() {
    let slot = CleanupSlot::new();
    assert!(!slot.release_now());
    assert_eq!(slot.releases(), 0);
}

#[test]
fn interrupt_release_then_drop_does_not_double_release() {
    let parent = scratch_dir("workspace-interrupt");
    let slot = CleanupSlot::new();
    let workspace = Workspace::acquire(&parent, &slot).expect("must acquire workspace");
    let dir = workspace.path().to_path_buf();

    assert!(slot.release_now());
    assert!(!dir.exists());
    drop(workspace);
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn only_one_workspace_at_a_time() {
    let parent = scratch_dir("workspace-single");
    let slot = CleanupSlot::new();
    let first = Workspace::acquire(&parent, &slot).expect("must acquire workspace");
    let err = Workspace::acquire(&parent, &slot).expect_err("second workspace must be refused");
    assert!(err.to_string().contains("still active"));
    first.release();

    let second = Workspace::acquire(&parent, &slot).expect("slot must be free again");
    second.release();
    assert_eq!(slot.releases(), 2);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn armed_workspace_directory_already_exists() {
    let parent = scratch_dir("workspace-armed");
    let slot = CleanupSlot::new();
    let workspace = Workspace::acquire(&parent, &slot).expect("must acquire workspace");

    let armed = slot.armed_path().expect("slot must be armed");
    assert!(armed.is_dir());
    workspace.release();

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn failed_workspace_creation_leaves_slot_unarmed() {
    let base = scratch_dir("workspace-blocked");
    fs::create_dir_all(&base).expect("must create base");
    let parent = base.join("not-a-dir");
    fs::write(&parent, b"file").expect("must write blocking file");
    let slot = CleanupSlot::new();

    let err = Workspace::acquire(&parent, &slot).expect_err("creation must fail");
    assert!(err.to_string().contains("failed to create install workspace"));
    assert!(!slot.is_armed());
    assert_eq!(slot.releases(), 0);
    assert!(slot.leaked_workspaces().is_empty());

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn shutdown_refuses_later_workspaces() {
    let parent = scratch_dir("workspace-shutdown");
    let slot = CleanupSlot::new();
    let workspace = Workspace::acquire(&parent, &slot).expect("must acquire workspace");
    let dir = workspace.path().to_path_buf();

    assert!(slot.shutdown());
    assert!(!dir.exists());
    drop(workspace);

    let err = Workspace::acquire(&parent, &slot).expect_err("slot must refuse after shutdown");
    assert!(err.to_string().contains("refused after shutdown"));
    assert!(workspace_entries(&parent).is_empty());
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn unremovable_workspace_is_reported_as_leaked() {
    let parent = scratch_dir("workspace-leak");
    let slot = CleanupSlot::new();
    let workspace = Workspace::acquire(&parent, &slot).expect("must acquire workspace");
    let dir = workspace.path().to_path_buf();

    // A regular file in place of the directory makes the removal fail.
    fs::remove_dir(&dir).expect("must remove empty workspace");
    fs::write(&dir, b"stale").expect("must write replacement file");

    workspace.release();
    assert!(!slot.is_armed());
    assert_eq!(slot.releases(), 1);
    assert_eq!(slot.leaked_workspaces(), vec![dir.clone()]);
    assert!(dir.exists());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_success_releases_workspace_once() {
    let parent = scratch_dir("install-ok");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    let downloader = ScriptedDownloader::serving(b"!<arch>\ndebian-binary");
    let version = Version::new(1, 61, 0);

    let outcome = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, false),
    )
    .expect("install must succeed");

    assert_eq!(outcome.version, version);
    assert_eq!(outcome.artifact.file_name, "gh_1.61.0_linux_amd64.deb");
    assert!(!outcome.dependencies_remediated);
    assert!(!outcome.checksum_verified);
    assert!(downloader.workspace_existed.get());

    let artifact_path = downloader.downloaded_to().expect("must have downloaded");
    assert_eq!(
        downloader.downloads.borrow()[0].0,
        "https://github.com/cli/cli/releases/download/v1.61.0/gh_1.61.0_linux_amd64.deb"
    );
    assert_eq!(
        fake.calls(),
        vec![format!("dpkg -i {}", artifact_path.display())]
    );
    assert_eq!(slot.releases(), 1);
    assert!(!slot.is_armed());
    assert!(workspace_entries(&parent).is_empty());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_download_failure_releases_workspace_and_skips_package_manager() {
    let parent = scratch_dir("install-404");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    let downloader = ScriptedDownloader::not_found();
    let version = Version::new(9, 9, 9);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, true),
    )
    .expect_err("404 must fail");

    let message = err.to_string();
    assert!(message.starts_with("download-failed:"));
    assert!(message.contains("404"));
    assert!(fake.calls().is_empty());
    assert_eq!(downloader.downloads.borrow().len(), 1, "no retry");
    assert_eq!(slot.releases(), 1);
    assert!(workspace_entries(&parent).is_empty());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_package_failure_releases_workspace() {
    let parent = scratch_dir("install-fail");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    fake.respond(
        "dpkg -i",
        failed_outcome(2, "dpkg: error: requested operation requires superuser privilege"),
    );
    let downloader = ScriptedDownloader::serving(b"deb");
    let version = Version::new(1, 61, 0);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, false),
    )
    .expect_err("dpkg failure must be fatal");

    let message = err.to_string();
    assert!(message.starts_with("install-failed:"));
    assert!(message.contains("superuser privilege"));
    assert_eq!(fake.calls().len(), 1, "no remediation for non-dependency failures");
    assert_eq!(slot.releases(), 1);
    assert!(workspace_entries(&parent).is_empty());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_resolves_unmet_dependencies_once_and_retries() {
    let parent = scratch_dir("install-deps");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    fake.respond("sudo dpkg -i", failed_outcome(1, DEPENDENCY_PROBLEMS));
    let downloader = ScriptedDownloader::serving(b"deb");
    let version = Version::new(1, 61, 0);

    let outcome = install_release(
        &fake.host(Escalation::Sudo),
        &downloader,
        &slot,
        &request(&version, &parent, false),
    )
    .expect("retry must succeed");

    assert!(outcome.dependencies_remediated);
    let artifact = downloader.downloaded_to().expect("must have downloaded");
    let install_line = format!("sudo dpkg -i {}", artifact.display());
    assert_eq!(
        fake.calls(),
        vec![
            install_line.clone(),
            "sudo apt-get update".to_string(),
            "sudo apt-get install -f -y".to_string(),
            install_line,
        ]
    );
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_second_dependency_failure_is_fatal() {
    let parent = scratch_dir("install-deps-twice");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    fake.respond("dpkg -i", failed_outcome(1, DEPENDENCY_PROBLEMS));
    fake.respond("dpkg -i", failed_outcome(1, DEPENDENCY_PROBLEMS));
    let downloader = ScriptedDownloader::serving(b"deb");
    let version = Version::new(1, 61, 0);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, false),
    )
    .expect_err("second failure must be fatal");

    assert!(err.to_string().contains("failed again after resolving dependencies"));
    let calls = fake.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(
        calls.iter().filter(|line| line.starts_with("dpkg -i")).count(),
        2
    );
    assert_eq!(
        calls
            .iter()
            .filter(|line| line.as_str() == "apt-get install -f -y")
            .count(),
        1
    );
    assert_eq!(slot.releases(), 1);
    assert!(workspace_entries(&parent).is_empty());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_dependency_fix_failure_is_fatal_without_retry() {
    let parent = scratch_dir("install-fix-fails");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    fake.respond("dpkg -i", failed_outcome(1, DEPENDENCY_PROBLEMS));
    fake.respond("apt-get install -f", failed_outcome(100, "E: Unmet dependencies."));
    let downloader = ScriptedDownloader::serving(b"deb");
    let version = Version::new(1, 61, 0);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, false),
    )
    .expect_err("fix failure must be fatal");

    assert!(err.to_string().starts_with("install-failed:"));
    assert_eq!(fake.calls().len(), 3);
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_interrupted_mid_download_releases_exactly_once() {
    let parent = scratch_dir("install-interrupt");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    let downloader = ScriptedDownloader::interrupted_by(&slot);
    let version = Version::new(1, 61, 0);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, false),
    )
    .expect_err("interrupted transfer must fail");

    assert!(err.to_string().starts_with("download-failed:"));
    assert!(fake.calls().is_empty());
    assert_eq!(slot.releases(), 1);
    assert!(!slot.is_armed());
    assert!(workspace_entries(&parent).is_empty());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_verifies_listed_checksum() {
    let parent = scratch_dir("install-checksum");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    let payload = b"abc";
    let listing = format!(
        "0000000000000000000000000000000000000000000000000000000000000000  gh_1.61.0_linux_arm64.deb\n{}  gh_1.61.0_linux_amd64.deb\n",
        sha256_hex(payload).to_ascii_uppercase()
    );
    let downloader = ScriptedDownloader::serving(payload).with_checksums(&listing);
    let version = Version::new(1, 61, 0);

    let outcome = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, true),
    )
    .expect("checksum must match");

    assert!(outcome.checksum_verified);
    assert_eq!(fake.calls().len(), 1);
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_checksum_mismatch_is_fatal_before_package_manager() {
    let parent = scratch_dir("install-checksum-bad");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    let listing = format!("{}  gh_1.61.0_linux_amd64.deb\n", sha256_hex(b"other"));
    let downloader = ScriptedDownloader::serving(b"abc").with_checksums(&listing);
    let version = Version::new(1, 61, 0);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, true),
    )
    .expect_err("mismatch must fail");

    assert!(err.to_string().starts_with("checksum-mismatch:"));
    assert!(fake.calls().is_empty());
    assert_eq!(slot.releases(), 1);
    assert!(workspace_entries(&parent).is_empty());

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn install_checksum_missing_entry_is_fatal() {
    let parent = scratch_dir("install-checksum-missing");
    let slot = CleanupSlot::new();
    let fake = FakeHost::default();
    let downloader = ScriptedDownloader::serving(b"abc")
        .with_checksums("deadbeef  gh_1.61.0_linux_arm64.deb\n");
    let version = Version::new(1, 61, 0);

    let err = install_release(
        &fake.host(Escalation::Direct),
        &downloader,
        &slot,
        &request(&version, &parent, true),
    )
    .expect_err("missing entry must fail");

    assert!(err.to_string().contains("does not list gh_1.61.0_linux_amd64.deb"));
    assert_eq!(slot.releases(), 1);

    let _ = fs::remove_dir_all(&parent);
}

#[test]
fn unmet_dependency_markers_are_recognized() {
    assert!(is_unmet_dependency_failure(&failed_outcome(1, DEPENDENCY_PROBLEMS)));
    assert!(is_unmet_dependency_failure(&failed_outcome(
        100,
        "The following packages have unmet dependencies:"
    )));
    assert!(!is_unmet_dependency_failure(&failed_outcome(
        2,
        "dpkg: error: cannot access archive"
    )));
}

#[test]
fn verification_is_healthy_when_all_checks_pass() {
    let fake = FakeHost::with_tools(&["gh", "git", "ssh"]);
    let report = verify_installation(&fake.host(Escalation::Direct), &strings(&["git", "ssh"]));

    assert!(report.is_healthy());
    assert_eq!(report.checks.len(), 3);
    assert_eq!(fake.calls(), strings(&["gh --version", "gh --help"]));
}

#[test]
fn verification_runs_every_check_and_reports_failures() {
    let fake = FakeHost::with_tools(&["gh", "ssh"]);
    fake.respond("gh --help", failed_outcome(1, "error while loading shared libraries"));
    let report = verify_installation(&fake.host(Escalation::Direct), &strings(&["git", "ssh"]));

    assert!(!report.is_healthy());
    let failures = report.failures().map(|check| check.kind).collect::<Vec<_>>();
    assert_eq!(failures, vec![CheckKind::Help, CheckKind::RuntimeTools]);
    assert!(report
        .check(CheckKind::VersionReport)
        .expect("version check")
        .passed);
    assert_eq!(
        report.check(CheckKind::RuntimeTools).expect("runtime check").detail,
        "missing on PATH: git"
    );
}

#[test]
fn verification_survives_missing_binary() {
    let fake = FakeHost::with_tools(&["git"]);
    fake.fail_launch("gh");
    let report = verify_installation(&fake.host(Escalation::Direct), &strings(&["git"]));
    assert!(!report.is_healthy());
    assert_eq!(report.failures().count(), 2);
}

#[test]
fn uninstall_absent_tool_is_noop() {
    let fake = FakeHost::default();
    let config_dir = scratch_dir("uninstall-absent");
    let mut asked = false;

    let result = uninstall_tool(&fake.host(Escalation::Sudo), &config_dir, |_, _| {
        asked = true;
        Ok(true)
    })
    .expect("absent tool must succeed");

    assert_eq!(result.status, UninstallStatus::NotInstalled);
    assert!(result.removal.is_none());
    assert!(!asked);
    assert!(fake.calls().is_empty());
}

#[test]
fn uninstall_removes_package_and_confirmed_config() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("gh --version", ok_outcome("gh version 2.40.1 (2023-12-13)\n"));
    let config_dir = scratch_dir("uninstall-config");
    fs::create_dir_all(&config_dir).expect("must create config dir");
    fs::write(config_dir.join("hosts.yml"), "github.com:\n  user: octocat\n")
        .expect("must write hosts file");

    let host = fake.host(Escalation::Sudo);
    let result = uninstall_tool(&host, &config_dir, |version, existing| {
        assert_eq!(version, &InstalledVersion::Known(Version::new(2, 40, 1)));
        assert_eq!(existing, Some(config_dir.as_path()));
        fake.present.borrow_mut().remove("gh");
        Ok(true)
    })
    .expect("uninstall must succeed");

    assert_eq!(result.status, UninstallStatus::Uninstalled);
    assert_eq!(result.removal, Some(RemovalMethod::PackageManager));
    assert!(result.config_removed);
    assert!(!config_dir.exists());
    assert!(result.still_on_path.is_none());
    assert_eq!(
        fake.calls(),
        strings(&["gh --version", "sudo apt-get remove -y gh"])
    );
}

#[test]
fn uninstall_keeps_config_when_declined() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("gh --version", ok_outcome("gh version 2.40.1 (2023-12-13)\n"));
    let config_dir = scratch_dir("uninstall-keep");
    fs::create_dir_all(&config_dir).expect("must create config dir");

    let result = uninstall_tool(&fake.host(Escalation::Direct), &config_dir, |_, _| Ok(false))
        .expect("uninstall must succeed");

    assert!(!result.config_removed);
    assert!(config_dir.exists());
    assert_eq!(
        result.still_on_path,
        Some(PathBuf::from("/usr/bin/gh")),
        "fake PATH still resolves gh"
    );

    let _ = fs::remove_dir_all(&config_dir);
}

#[test]
fn uninstall_skips_config_prompt_target_when_directory_missing() {
    let fake = FakeHost::with_tools(&["gh"]);
    let config_dir = scratch_dir("uninstall-no-config");

    let result = uninstall_tool(&fake.host(Escalation::Direct), &config_dir, |version, existing| {
        assert_eq!(version, &InstalledVersion::Unknown);
        assert!(existing.is_none());
        Ok(true)
    })
    .expect("uninstall must succeed");

    assert!(!result.config_removed);
}

#[test]
fn uninstall_falls_back_to_dpkg() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("apt-get remove", failed_outcome(100, "E: apt is locked"));
    let config_dir = scratch_dir("uninstall-fallback");

    let result = uninstall_tool(&fake.host(Escalation::Direct), &config_dir, |_, _| Ok(false))
        .expect("fallback must succeed");

    assert_eq!(result.removal, Some(RemovalMethod::DpkgFallback));
    assert_eq!(
        fake.calls(),
        strings(&["gh --version", "apt-get remove -y gh", "dpkg -r gh"])
    );
}

#[test]
fn uninstall_fails_when_both_removal_methods_fail() {
    let fake = FakeHost::with_tools(&["gh"]);
    fake.respond("apt-get remove", failed_outcome(100, "E: apt is locked"));
    fake.respond("dpkg -r", failed_outcome(2, "dpkg: error: dpkg frontend is locked"));
    let config_dir = scratch_dir("uninstall-fails");
    fs::create_dir_all(&config_dir).expect("must create config dir");

    let err = uninstall_tool(&fake.host(Escalation::Direct), &config_dir, |_, _| Ok(true))
        .expect_err("double failure must be fatal");

    let message = err.to_string();
    assert!(message.starts_with("uninstall-failed:"));
    assert!(message.contains("apt is locked"));
    assert!(message.contains("frontend is locked"));
    assert!(config_dir.exists(), "config survives a failed removal");

    let _ = fs::remove_dir_all(&config_dir);
}

#[test]
fn tool_config_dir_prefers_explicit_override() {
    let env = |key: &str| match key {
        "GH_CONFIG_DIR" => Some("/srv/gh-config".to_string()),
        "XDG_CONFIG_HOME" => Some("/home/u/.xdg".to_string()),
        "HOME" => Some("/home/u".to_string()),
        _ => None,
    };
    assert_eq!(
        tool_config_dir_from(env).expect("must resolve"),
        PathBuf::from("/srv/gh-config")
    );
}

#[test]
fn tool_config_dir_falls_back_to_xdg_then_home() {
    let xdg = |key: &str| match key {
        "XDG_CONFIG_HOME" => Some("/home/u/.xdg".to_string()),
        "HOME" => Some("/home/u".to_string()),
        _ => None,
    };
    assert_eq!(
        tool_config_dir_from(xdg).expect("must resolve"),
        PathBuf::from("/home/u/.xdg/gh")
    );

    let home = |key: &str| match key {
        "HOME" => Some("/home/u".to_string()),
        "XDG_CONFIG_HOME" => Some(String::new()),
        _ => None,
    };
    assert_eq!(
        tool_config_dir_from(home).expect("must resolve"),
        PathBuf::from("/home/u/.config/gh")
    );

    assert!(tool_config_dir_from(|_| None).is_err());
}

#[test]
fn settings_path_honors_env_override() {
    let explicit = |key: &str| (key == "GHUP_CONFIG").then(|| "/etc/ghup.toml".to_string());
    assert_eq!(
        settings_path_from(explicit).expect("must resolve"),
        PathBuf::from("/etc/ghup.toml")
    );

    let home = |key: &str| (key == "HOME").then(|| "/home/u".to_string());
    assert_eq!(
        settings_path_from(home).expect("must resolve"),
        PathBuf::from("/home/u/.config/ghup/config.toml")
    );
}

#[test]
fn checksum_listing_lookup_matches_exact_name() {
    let listing = "aaa  gh_1.61.0_linux_amd64.deb\nbbb *gh_1.61.0_linux_arm64.deb\nccc  gh_1.61.0_linux_amd64.deb.sig\n";
    assert_eq!(
        find_listed_checksum(listing, "gh_1.61.0_linux_amd64.deb"),
        Some("aaa")
    );
    assert_eq!(
        find_listed_checksum(listing, "gh_1.61.0_linux_arm64.deb"),
        Some("bbb")
    );
    assert_eq!(find_listed_checksum(listing, "gh_1.61.0_linux_386.deb"), None);
}

#[test]
fn sha256_hex_matches_known_vector() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn escalation_wraps_only_privileged_invocations() {
    let plain = Invocation::new("gh", ["--version"]);
    assert_eq!(Escalation::Sudo.apply(&plain), plain);

    let privileged = Invocation::new("dpkg", ["-r", "gh"]).privileged();
    let wrapped = Escalation::Sudo.apply(&privileged);
    assert_eq!(wrapped.program, "sudo");
    assert_eq!(wrapped.command_line(), "sudo dpkg -r gh");
    assert_eq!(Escalation::Direct.apply(&privileged), privileged);
}

#[test]
fn effective_uid_is_read_from_proc_status() {
    let status = "Name:\tghup\nUid:\t1000\t0\t0\t0\nGid:\t1000\t1000\t1000\t1000\n";
    assert_eq!(effective_uid(status), Some(0));
    assert_eq!(effective_uid("Name:\tghup\n"), None);
}

#[test]
fn combined_output_joins_streams() {
    let outcome = CommandOutcome {
        success: false,
        code: Some(1),
        stdout: "Reading package lists...\n".to_string(),
        stderr: "E: broken\n".to_string(),
    };
    assert_eq!(outcome.combined_output(), "Reading package lists...\nE: broken");
    assert_eq!(failed_outcome(1, "only err").combined_output(), "only err");
}

#[test]
fn remove_dir_if_exists_reports_absence() {
    let dir = scratch_dir("remove-dir");
    assert!(!remove_dir_if_exists(&dir).expect("missing dir is ok"));
    fs::create_dir_all(dir.join("nested")).expect("must create dir");
    assert!(remove_dir_if_exists(&dir).expect("must remove"));
    assert!(!dir.exists());
}
