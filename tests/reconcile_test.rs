/*!
 * Reconciliation engine scenarios against an in-memory remote
 *
 * Covers:
 * - Fresh backup of a small tree
 * - No-op re-initialization (probes only, zero uploads)
 * - Local modification, deletion, and rename ordering in steady state
 * - Recovery when the server mirror loses an entry out-of-band
 * - Termination of the parallel walk on wide and deep trees
 */

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use vigil::digest::file_sha256;
use vigil::{Outcome, RelPath, Remote, Result, Watcher};

const HELLO_DIGEST: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
const WORLD_DIGEST: &str = "486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    ProbeFolder(String),
    ProbeFile(String),
    BackupFile(String),
    BackupFolder(String),
    Delete(String),
}

#[derive(Debug, Clone)]
enum Entry {
    Folder,
    File(String),
}

#[derive(Default)]
struct MirrorState {
    entries: BTreeMap<String, Entry>,
    calls: Vec<Call>,
}

/// In-memory stand-in for the server: keeps a relative-path mirror and a
/// call log. `probe_file` mimics the wire client's mismatch repair so the
/// engine sees the same `Found`/`Missing` answers it would get on the wire.
#[derive(Clone)]
struct FakeRemote {
    root: PathBuf,
    state: Arc<Mutex<MirrorState>>,
}

impl FakeRemote {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            state: Arc::new(Mutex::new(MirrorState::default())),
        }
    }

    fn rel(&self, abs: &Path) -> String {
        RelPath::new(&self.root, abs).unwrap().as_str().to_string()
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn uploads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::BackupFile(_) | Call::BackupFolder(_)))
            .count()
    }

    fn digest_of(&self, rel: &str) -> Option<String> {
        match self.state.lock().unwrap().entries.get(rel) {
            Some(Entry::File(digest)) => Some(digest.clone()),
            _ => None,
        }
    }

    fn has_folder(&self, rel: &str) -> bool {
        matches!(
            self.state.lock().unwrap().entries.get(rel),
            Some(Entry::Folder)
        )
    }

    fn forget(&self, rel: &str) {
        self.state.lock().unwrap().entries.remove(rel);
    }

    fn remove_subtree(state: &mut MirrorState, rel: &str) {
        let prefix = format!("{}/", rel);
        state
            .entries
            .retain(|key, _| key != rel && !key.starts_with(&prefix));
    }
}

impl Remote for FakeRemote {
    fn probe_folder(&self, abs: &Path) -> Result<Outcome> {
        let rel = self.rel(abs);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ProbeFolder(rel.clone()));
        match state.entries.get(&rel) {
            Some(Entry::Folder) => Ok(Outcome::Found),
            _ => Ok(Outcome::Missing),
        }
    }

    fn probe_file(&self, abs: &Path) -> Result<Outcome> {
        let rel = self.rel(abs);
        let local = file_sha256(abs)?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ProbeFile(rel.clone()));
        match state.entries.get(&rel) {
            Some(Entry::File(remote)) if *remote == local => Ok(Outcome::Found),
            Some(Entry::File(_)) => {
                // Stale mirror content: the wire client deletes, re-uploads
                // and re-probes; surface the same call sequence here.
                state.calls.push(Call::Delete(rel.clone()));
                state.calls.push(Call::BackupFile(rel.clone()));
                state.calls.push(Call::ProbeFile(rel.clone()));
                state.entries.insert(rel, Entry::File(local));
                Ok(Outcome::Found)
            }
            _ => Ok(Outcome::Missing),
        }
    }

    fn backup_file(&self, abs: &Path) -> Result<()> {
        let rel = self.rel(abs);
        let digest = file_sha256(abs)?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::BackupFile(rel.clone()));
        state.entries.insert(rel, Entry::File(digest));
        Ok(())
    }

    fn backup_folder(&self, abs: &Path) -> Result<()> {
        let rel = self.rel(abs);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::BackupFolder(rel.clone()));
        state.entries.insert(rel, Entry::Folder);
        Ok(())
    }

    fn delete_path(&self, abs: &Path) -> Result<()> {
        let rel = self.rel(abs);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(rel.clone()));
        Self::remove_subtree(&mut state, &rel);
        Ok(())
    }
}

/// `/root/a.txt` ("hello") and `/root/sub/b.txt` ("world")
fn small_tree(root: &Path) {
    std::fs::write(root.join("a.txt"), b"hello").unwrap();
    std::fs::create_dir(root.join("sub")).unwrap();
    std::fs::write(root.join("sub").join("b.txt"), b"world").unwrap();
}

fn watcher_for(root: &Path) -> (Watcher<FakeRemote>, FakeRemote) {
    let remote = FakeRemote::new(root);
    let handle = remote.clone();
    let watcher = Watcher::new(remote, root.to_path_buf(), Duration::from_millis(10), 3);
    (watcher, handle)
}

/// Force a different mtime without relying on filesystem tick resolution.
fn bump_mtime(path: &Path) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
}

// =============================================================================
// Initialization
// =============================================================================

#[test]
fn test_fresh_backup() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();

    assert!(remote.has_folder(""));
    assert!(remote.has_folder("sub"));
    assert_eq!(remote.digest_of("a.txt").as_deref(), Some(HELLO_DIGEST));
    assert_eq!(remote.digest_of("sub/b.txt").as_deref(), Some(WORLD_DIGEST));

    // root, a.txt, sub, sub/b.txt
    assert_eq!(watcher.index().len(), 4);
}

#[test]
fn test_restart_is_probe_only() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();

    remote.clear_calls();
    watcher.initialize().unwrap();

    assert_eq!(remote.uploads(), 0, "re-initialization must not upload");
    assert!(remote
        .calls()
        .iter()
        .all(|c| matches!(c, Call::ProbeFolder(_) | Call::ProbeFile(_))));
}

#[test]
fn test_initialize_restores_forgotten_file() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();

    // The mirror loses a file out-of-band.
    remote.forget("a.txt");
    remote.clear_calls();

    watcher.initialize().unwrap();
    assert_eq!(remote.digest_of("a.txt").as_deref(), Some(HELLO_DIGEST));
    assert!(remote.calls().contains(&Call::BackupFile("a.txt".to_string())));
}

#[test]
fn test_initialize_terminates_on_wide_and_deep_tree() {
    let dir = tempfile::tempdir().unwrap();

    // Several sibling branches of different depths, some with files only.
    for branch in 0..4 {
        let mut path = dir.path().join(format!("branch{}", branch));
        for level in 0..=branch {
            path = path.join(format!("level{}", level));
        }
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("leaf.txt"), b"leaf").unwrap();
    }
    std::fs::write(dir.path().join("top.txt"), b"top").unwrap();

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();

    assert!(remote.has_folder("branch0/level0"));
    assert!(remote.has_folder("branch3/level0/level1/level2/level3"));
    assert_eq!(
        remote.digest_of("branch3/level0/level1/level2/level3/leaf.txt"),
        Some(file_sha256(
            &dir.path()
                .join("branch3/level0/level1/level2/level3/leaf.txt")
        )
        .unwrap())
    );
}

#[test]
fn test_initialize_of_empty_root() {
    let dir = tempfile::tempdir().unwrap();

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();

    assert!(remote.has_folder(""));
    assert_eq!(watcher.index().len(), 1);
}

// =============================================================================
// Steady state
// =============================================================================

#[test]
fn test_modification_is_delete_then_upload() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();
    remote.clear_calls();

    std::fs::write(dir.path().join("a.txt"), b"HELLO").unwrap();
    bump_mtime(&dir.path().join("a.txt"));

    watcher.tick().unwrap();

    let calls = remote.calls();
    let delete = calls
        .iter()
        .position(|c| *c == Call::Delete("a.txt".to_string()))
        .expect("modification must delete the old mirror entry");
    let upload = calls
        .iter()
        .position(|c| *c == Call::BackupFile("a.txt".to_string()))
        .expect("modification must re-upload");
    assert!(delete < upload);

    assert_eq!(
        remote.digest_of("a.txt"),
        Some(file_sha256(&dir.path().join("a.txt")).unwrap())
    );

    // Nothing left to report.
    remote.clear_calls();
    watcher.tick().unwrap();
    assert!(remote.calls().is_empty());
}

#[test]
fn test_local_deletion_without_spurious_parent_event() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();
    remote.clear_calls();

    std::fs::remove_file(dir.path().join("sub").join("b.txt")).unwrap();
    watcher.tick().unwrap();

    assert_eq!(
        remote.calls(),
        vec![Call::Delete("sub/b.txt".to_string())],
        "only the deletion itself goes to the server"
    );
    assert!(!watcher.index().contains(&dir.path().join("sub").join("b.txt")));

    // The parent's refreshed mtime must not read as a modification later.
    remote.clear_calls();
    watcher.tick().unwrap();
    assert!(remote.calls().is_empty());
}

#[test]
fn test_creation_detected() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();
    remote.clear_calls();

    std::fs::create_dir(dir.path().join("new dir")).unwrap();
    std::fs::write(dir.path().join("new dir").join("c.txt"), b"fresh").unwrap();

    watcher.tick().unwrap();

    assert!(remote.has_folder("new dir"));
    assert_eq!(
        remote.digest_of("new dir/c.txt"),
        Some(file_sha256(&dir.path().join("new dir").join("c.txt")).unwrap())
    );
    assert_eq!(watcher.index().len(), 6);
}

#[test]
fn test_rename_orders_deletion_before_creation() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();
    remote.clear_calls();

    std::fs::rename(dir.path().join("a.txt"), dir.path().join("renamed.txt")).unwrap();
    watcher.tick().unwrap();

    let calls = remote.calls();
    let delete = calls
        .iter()
        .position(|c| *c == Call::Delete("a.txt".to_string()))
        .expect("old name must be deleted");
    let create = calls
        .iter()
        .position(|c| *c == Call::BackupFile("renamed.txt".to_string()))
        .expect("new name must be uploaded");
    assert!(delete < create, "deletions precede creations within a tick");
}

#[test]
fn test_mismatch_repair_converges() {
    let dir = tempfile::tempdir().unwrap();
    small_tree(dir.path());

    let (watcher, remote) = watcher_for(dir.path());
    watcher.initialize().unwrap();

    // Corrupt the mirror's view of a.txt, then re-initialize: the probe
    // repairs it and the follow-up probe agrees.
    remote
        .state
        .lock()
        .unwrap()
        .entries
        .insert("a.txt".to_string(), Entry::File("0".repeat(64)));
    remote.clear_calls();

    watcher.initialize().unwrap();
    assert_eq!(remote.digest_of("a.txt").as_deref(), Some(HELLO_DIGEST));

    let calls = remote.calls();
    assert!(calls.contains(&Call::Delete("a.txt".to_string())));
    assert!(calls.contains(&Call::BackupFile("a.txt".to_string())));
}
