//! In-memory remote client.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::path::{FilePath, FolderPath};
use crate::remote::{
    HashPersistor, ItemStream, RemoteClient, RemoteError, RemoteFile, RemoteFolder, RemoteItem,
    SecretProvider, TransferProgress,
};

/// Creation time stamped on every item of a [`MemoryRemote`].
pub fn fixed_created() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
}

/// How data transfers (download, upload, replace, copy) behave.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Normal,
    /// Reports 50% and then waits until the operation is cancelled.
    StallMidway,
    /// Reports 50% and then fails with a transport error.
    FailMidway(String),
}

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File(Vec<u8>),
}

/// (is_private, backend path)
type Key = (bool, String);

#[derive(Debug)]
struct State {
    nodes: BTreeMap<Key, Node>,
    password: String,
    logged_in: bool,
    transfer_mode: TransferMode,
    listing_failure: Option<String>,
    failing_call: Option<(&'static str, String)>,
    calls: Vec<&'static str>,
}

/// A remote storage tree held in memory.
///
/// Both partition roots always exist. Every operation except `login`
/// requires a prior successful login.
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<State>,
    open_listings: Arc<AtomicUsize>,
}

impl MemoryRemote {
    pub fn new(password: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert((true, "/".to_string()), Node::Folder);
        nodes.insert((false, "/".to_string()), Node::Folder);
        Self {
            state: Mutex::new(State {
                nodes,
                password: password.to_string(),
                logged_in: false,
                transfer_mode: TransferMode::Normal,
                listing_failure: None,
                failing_call: None,
                calls: Vec::new(),
            }),
            open_listings: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adds a folder and any missing ancestors.
    pub fn add_folder(&self, private: bool, path: &str) {
        let path = FolderPath::new(path, private).path().to_string();
        let mut state = self.state.lock();
        for ancestor in ancestors(&path) {
            state.nodes.entry((private, ancestor)).or_insert(Node::Folder);
        }
        state.nodes.insert((private, path), Node::Folder);
    }

    /// Adds a file and any missing ancestor folders.
    pub fn add_file(&self, private: bool, path: &str, data: &[u8]) {
        let path = FilePath::new(path, private).path().to_string();
        let mut state = self.state.lock();
        for ancestor in ancestors(&path) {
            state.nodes.entry((private, ancestor)).or_insert(Node::Folder);
        }
        state.nodes.insert((private, path), Node::File(data.to_vec()));
    }

    pub fn has_folder(&self, private: bool, path: &str) -> bool {
        matches!(
            self.state.lock().nodes.get(&(private, path.to_string())),
            Some(Node::Folder)
        )
    }

    pub fn has_file(&self, private: bool, path: &str) -> bool {
        self.file_data(private, path).is_some()
    }

    pub fn file_data(&self, private: bool, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().nodes.get(&(private, path.to_string())) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn password_matches(&self, password: &str) -> bool {
        self.state.lock().password == password
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.state.lock().logged_in = logged_in;
    }

    pub fn set_transfer_mode(&self, mode: TransferMode) {
        self.state.lock().transfer_mode = mode;
    }

    /// Makes every listing call fail with a transport error.
    pub fn fail_listings_with(&self, message: &str) {
        self.state.lock().listing_failure = Some(message.to_string());
    }

    /// Makes every call named `call` fail with a transport error.
    pub fn fail_call(&self, call: &'static str, message: &str) {
        self.state.lock().failing_call = Some((call, message.to_string()));
    }

    /// Names of the client calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == name).count()
    }

    /// Number of calls that moved file data.
    pub fn transfer_count(&self) -> usize {
        ["download", "upload_file", "replace", "copy_to"]
            .iter()
            .map(|name| self.call_count(name))
            .sum()
    }

    /// Listings handed out and not yet dropped.
    pub fn open_listings(&self) -> usize {
        self.open_listings.load(Ordering::SeqCst)
    }

    fn enter(&self, call: &'static str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if !state.logged_in {
            return Err(RemoteError::Rejected("not logged in".to_string()));
        }
        match &state.failing_call {
            Some((failing, message)) if *failing == call => {
                Err(RemoteError::transport(message.clone()))
            }
            _ => Ok(()),
        }
    }

    fn transfer_mode(&self) -> TransferMode {
        self.state.lock().transfer_mode.clone()
    }

    /// Applies the transfer mode at the midpoint of a transfer.
    async fn midway(
        &self,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<(), RemoteError> {
        progress.report(50);
        match self.transfer_mode() {
            TransferMode::Normal => {
                if cancel.is_cancelled() {
                    return Err(RemoteError::Cancelled);
                }
                Ok(())
            }
            TransferMode::StallMidway => {
                cancel.cancelled().await;
                Err(RemoteError::Cancelled)
            }
            TransferMode::FailMidway(message) => Err(RemoteError::transport_with(
                message,
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
            )),
        }
    }

    fn listing(&self, items: Vec<RemoteItem>) -> ItemStream {
        self.open_listings.fetch_add(1, Ordering::SeqCst);
        Box::new(TrackedListing {
            items: items.into_iter(),
            open: Arc::clone(&self.open_listings),
        })
    }

    fn item_at(&self, key: &Key) -> Option<RemoteItem> {
        self.state
            .lock()
            .nodes
            .get(key)
            .map(|node| to_item(key, node))
    }

    /// Moves `from` (and its subtree) to `to`.
    fn relocate(&self, from: &Key, to: Key) -> Result<RemoteItem, RemoteError> {
        let mut state = self.state.lock();
        if state.nodes.contains_key(&to) {
            return Err(RemoteError::Rejected(format!("{} already exists", to.1)));
        }
        let prefix = format!("{}/", from.1);
        let moved: Vec<Key> = state
            .nodes
            .keys()
            .filter(|(private, path)| {
                *private == from.0 && (path == &from.1 || path.starts_with(&prefix))
            })
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(not_found(from));
        }
        for key in moved {
            if let Some(node) = state.nodes.remove(&key) {
                let rest = &key.1[from.1.len()..];
                state.nodes.insert((to.0, format!("{}{rest}", to.1)), node);
            }
        }
        let node = state.nodes.get(&to).cloned().ok_or_else(|| not_found(&to))?;
        Ok(to_item(&to, &node))
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    async fn login(
        &self,
        _user_name: &str,
        secrets: &dyn SecretProvider,
        hashes: &dyn HashPersistor,
    ) -> Result<bool, RemoteError> {
        let expected = {
            let mut state = self.state.lock();
            state.calls.push("login");
            password_hash(&state.password)
        };
        if hashes
            .stored_hash()
            .is_some_and(|hash| hash.expose_secret() == expected)
        {
            self.set_logged_in(true);
            return Ok(true);
        }

        let password = secrets.password()?;
        if password_hash(password.expose_secret()) != expected {
            return Ok(false);
        }
        self.set_logged_in(true);
        hashes.save_hash(SecretString::from(expected));
        Ok(true)
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        self.enter("logout")?;
        self.set_logged_in(false);
        Ok(())
    }

    fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }

    async fn find_folder(&self, path: &FolderPath) -> Result<Option<RemoteFolder>, RemoteError> {
        self.enter("find_folder")?;
        Ok(match self.item_at(&folder_key(path)) {
            Some(RemoteItem::Folder(folder)) => Some(folder),
            _ => None,
        })
    }

    async fn find_file(&self, path: &FilePath) -> Result<Option<RemoteFile>, RemoteError> {
        self.enter("find_file")?;
        Ok(match self.item_at(&file_key(path)) {
            Some(RemoteItem::File(file)) => Some(file),
            _ => None,
        })
    }

    async fn folder_items(&self, path: &FolderPath) -> Result<ItemStream, RemoteError> {
        self.enter("folder_items")?;
        let items = {
            let state = self.state.lock();
            if let Some(message) = &state.listing_failure {
                return Err(RemoteError::transport(message.clone()));
            }
            let key = folder_key(path);
            if !matches!(state.nodes.get(&key), Some(Node::Folder)) {
                return Err(RemoteError::FolderNotFound(path.path().to_string()));
            }
            state
                .nodes
                .iter()
                .filter(|((private, p), _)| {
                    *private == key.0 && p != &key.1 && parent_of(p) == key.1
                })
                .map(|(k, node)| to_item(k, node))
                .collect()
        };
        Ok(self.listing(items))
    }

    async fn folder_all_files_recursive(
        &self,
        path: &FolderPath,
        depth: usize,
    ) -> Result<ItemStream, RemoteError> {
        self.enter("folder_all_files_recursive")?;
        let items = {
            let state = self.state.lock();
            if let Some(message) = &state.listing_failure {
                return Err(RemoteError::transport(message.clone()));
            }
            let key = folder_key(path);
            if !matches!(state.nodes.get(&key), Some(Node::Folder)) {
                return Err(RemoteError::FolderNotFound(path.path().to_string()));
            }
            let base_depth = segment_count(&key.1);
            state
                .nodes
                .iter()
                .filter(|((private, p), node)| {
                    *private == key.0
                        && matches!(node, Node::File(_))
                        && is_below(p, &key.1)
                        && segment_count(p) - base_depth <= depth.saturating_add(1)
                })
                .map(|(k, node)| to_item(k, node))
                .collect()
        };
        Ok(self.listing(items))
    }

    async fn get_file(&self, path: &FilePath) -> Result<RemoteFile, RemoteError> {
        self.enter("get_file")?;
        match self.item_at(&file_key(path)) {
            Some(RemoteItem::File(file)) => Ok(file),
            _ => Err(RemoteError::FileNotFound(path.path().to_string())),
        }
    }

    async fn download(
        &self,
        file: &RemoteFile,
        target: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<(), RemoteError> {
        self.enter("download")?;
        let data = self
            .file_data(file.path.is_private(), file.path.path())
            .ok_or_else(|| RemoteError::FileNotFound(file.path.path().to_string()))?;
        let (head, tail) = data.split_at(data.len() / 2);
        target.write_all(head).await?;
        self.midway(cancel, progress).await?;
        target.write_all(tail).await?;
        progress.report(100);
        Ok(())
    }

    async fn upload_file(
        &self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        path: &FilePath,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<RemoteFile, RemoteError> {
        self.enter("upload_file")?;
        let folder = path.folder();
        if !self.has_folder(folder.is_private(), folder.path()) {
            return Err(RemoteError::FolderNotFound(folder.path().to_string()));
        }
        let data = read_body(source, length).await?;
        self.midway(cancel, progress).await?;
        self.state
            .lock()
            .nodes
            .insert(file_key(path), Node::File(data.clone()));
        progress.report(100);
        Ok(RemoteFile {
            path: path.clone(),
            size: data.len() as u64,
            created: fixed_created(),
        })
    }

    async fn replace(
        &self,
        file: &RemoteFile,
        source: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<(), RemoteError> {
        self.enter("replace")?;
        let key = file_key(&file.path);
        if !matches!(self.state.lock().nodes.get(&key), Some(Node::File(_))) {
            return Err(RemoteError::FileNotFound(file.path.path().to_string()));
        }
        let data = read_body(source, length).await?;
        self.midway(cancel, progress).await?;
        self.state.lock().nodes.insert(key, Node::File(data));
        progress.report(100);
        Ok(())
    }

    async fn rename(&self, item: &RemoteItem, new_name: &str) -> Result<RemoteItem, RemoteError> {
        self.enter("rename")?;
        let from = (item.is_private(), item.backend_path().to_string());
        let to = (from.0, join(&parent_of(&from.1), new_name));
        self.relocate(&from, to)
    }

    async fn move_to(
        &self,
        item: &RemoteItem,
        target: &RemoteFolder,
    ) -> Result<RemoteItem, RemoteError> {
        self.enter("move_to")?;
        let from = (item.is_private(), item.backend_path().to_string());
        let to = (
            target.path.is_private(),
            join(target.path.path(), item.name()),
        );
        self.relocate(&from, to)
    }

    async fn delete(&self, item: &RemoteItem) -> Result<(), RemoteError> {
        self.enter("delete")?;
        let key = (item.is_private(), item.backend_path().to_string());
        let prefix = format!("{}/", key.1);
        let mut state = self.state.lock();
        if state.nodes.remove(&key).is_none() {
            return Err(not_found(&key));
        }
        state
            .nodes
            .retain(|(private, path), _| !(*private == key.0 && path.starts_with(&prefix)));
        Ok(())
    }

    async fn copy_to(
        &self,
        file: &RemoteFile,
        target: &RemoteFolder,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<RemoteFile, RemoteError> {
        self.enter("copy_to")?;
        let data = self
            .file_data(file.path.is_private(), file.path.path())
            .ok_or_else(|| RemoteError::FileNotFound(file.path.path().to_string()))?;
        self.midway(cancel, progress).await?;

        let path = FilePath::new(
            join(target.path.path(), file.name()),
            target.path.is_private(),
        );
        let key = file_key(&path);
        let mut state = self.state.lock();
        if state.nodes.contains_key(&key) {
            return Err(RemoteError::Rejected(format!("{} already exists", key.1)));
        }
        state.nodes.insert(key, Node::File(data));
        drop(state);
        progress.report(100);
        Ok(RemoteFile {
            path,
            size: file.size,
            created: fixed_created(),
        })
    }

    async fn create_folder(&self, path: &FolderPath) -> Result<RemoteFolder, RemoteError> {
        self.enter("create_folder")?;
        let key = folder_key(path);
        let mut state = self.state.lock();
        if !matches!(
            state.nodes.get(&(key.0, parent_of(&key.1))),
            Some(Node::Folder)
        ) {
            return Err(RemoteError::FolderNotFound(parent_of(&key.1)));
        }
        if state.nodes.contains_key(&key) {
            return Err(RemoteError::Rejected(format!("{} already exists", key.1)));
        }
        state.nodes.insert(key, Node::Folder);
        Ok(RemoteFolder {
            path: path.clone(),
            created: fixed_created(),
        })
    }
}

struct TrackedListing {
    items: std::vec::IntoIter<RemoteItem>,
    open: Arc<AtomicUsize>,
}

impl Iterator for TrackedListing {
    type Item = Result<RemoteItem, RemoteError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(Ok)
    }
}

impl Drop for TrackedListing {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

fn password_hash(password: &str) -> String {
    format!("hash:{password}")
}

fn folder_key(path: &FolderPath) -> Key {
    (path.is_private(), path.path().to_string())
}

fn file_key(path: &FilePath) -> Key {
    (path.is_private(), path.path().to_string())
}

fn to_item(key: &Key, node: &Node) -> RemoteItem {
    match node {
        Node::Folder => RemoteItem::Folder(RemoteFolder {
            path: FolderPath::new(key.1.clone(), key.0),
            created: fixed_created(),
        }),
        Node::File(data) => RemoteItem::File(RemoteFile {
            path: FilePath::new(key.1.clone(), key.0),
            size: data.len() as u64,
            created: fixed_created(),
        }),
    }
}

fn not_found(key: &Key) -> RemoteError {
    RemoteError::FileNotFound(key.1.clone())
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn segment_count(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

fn is_below(path: &str, folder: &str) -> bool {
    if folder == "/" {
        path != "/"
    } else {
        path.starts_with(&format!("{folder}/"))
    }
}

fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = parent_of(path);
    while current != "/" {
        let next = parent_of(&current);
        out.push(current);
        current = next;
    }
    out
}

async fn read_body(
    source: &mut (dyn AsyncRead + Unpin + Send),
    length: u64,
) -> Result<Vec<u8>, RemoteError> {
    let mut data = Vec::new();
    source.read_to_end(&mut data).await?;
    if data.len() as u64 != length {
        return Err(RemoteError::transport(format!(
            "expected {length} bytes, read {}",
            data.len()
        )));
    }
    Ok(data)
}
