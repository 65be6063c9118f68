//! Bounded Ordered Store
//!
//! Accepted items, newest first, capped at a fixed capacity. The deque is the
//! source of truth; the RSS document on disk is a projection rebuilt on every
//! save.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use newswire_core::{Item, NewswireConfig};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Feed document error: {0}")]
    Xml(#[from] rss::Error),
}

/// Channel-level fields written to the persisted document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMeta {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl From<&NewswireConfig> for ChannelMeta {
    fn from(config: &NewswireConfig) -> Self {
        Self {
            title: config.channel_title.clone(),
            link: config.channel_link.clone(),
            description: config.channel_description.clone(),
        }
    }
}

/// Insertion-ordered, capacity-bounded item sequence
#[derive(Debug)]
pub struct BoundedStore {
    items: VecDeque<Item>,
    capacity: usize,
    path: PathBuf,
    meta: ChannelMeta,
}

impl BoundedStore {
    /// Empty store that will persist to `path`
    pub fn new(path: impl AsRef<Path>, capacity: usize, meta: ChannelMeta) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            path: path.as_ref().to_path_buf(),
            meta,
        }
    }

    /// Load the persisted document.
    ///
    /// A missing document is first created empty. An unreadable or corrupt
    /// one is logged and replaced by an empty store: losing dedup history is
    /// recoverable, refusing to run is not.
    pub fn load(path: impl AsRef<Path>, capacity: usize, meta: ChannelMeta) -> Self {
        let mut store = Self::new(path, capacity, meta);

        if !store.path.exists() {
            info!("No store at {:?}, creating an empty one", store.path);
            if let Err(e) = store.save() {
                warn!("Failed to create empty store at {:?}: {}", store.path, e);
                return store;
            }
        }

        match store.read_document() {
            Ok(items) => {
                store.items = items;
                let evicted = store.truncate();
                info!(
                    "Loaded {} items from {:?} ({} over capacity dropped)",
                    store.items.len(),
                    store.path,
                    evicted
                );
            }
            Err(e) => {
                warn!("Store at {:?} is unreadable, starting empty: {}", store.path, e);
            }
        }

        store
    }

    fn read_document(&self) -> Result<VecDeque<Item>, StoreError> {
        let file = File::open(&self.path)?;
        let channel = rss::Channel::read_from(BufReader::new(file))?;

        Ok(channel
            .items()
            .iter()
            .map(|item| {
                Item::new(
                    item.title().unwrap_or_default(),
                    item.link().unwrap_or_default(),
                    item.pub_date().unwrap_or_default(),
                )
            })
            .collect())
    }

    /// Project the store into an RSS channel, newest item first
    pub fn to_channel(&self) -> rss::Channel {
        let mut channel = rss::Channel::default();
        channel.set_title(self.meta.title.clone());
        channel.set_link(self.meta.link.clone());
        channel.set_description(self.meta.description.clone());

        let items: Vec<rss::Item> = self
            .items
            .iter()
            .map(|item| {
                let mut rss_item = rss::Item::default();
                rss_item.set_title(Some(item.title.clone()));
                rss_item.set_link(Some(item.link.clone()));
                rss_item.set_pub_date(Some(item.published_at.clone()));
                rss_item
            })
            .collect();
        channel.set_items(items);

        channel
    }

    /// Persist the full sequence.
    ///
    /// Writes a sibling temporary file and renames it over the document, so
    /// readers only ever see a complete document.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let file = File::create(&tmp_path)?;
            let writer = self.to_channel().write_to(BufWriter::new(file))?;
            writer
                .into_inner()
                .map_err(|e| e.into_error())?
                .sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!("Saved {} items to {:?}", self.items.len(), self.path);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Insert at the head, evicting from the tail past capacity.
    ///
    /// Returns how many items were evicted.
    pub fn insert_front(&mut self, item: Item) -> usize {
        self.items.push_front(item);
        self.truncate()
    }

    /// Enforce the capacity bound; returns how many items were evicted
    pub fn truncate(&mut self) -> usize {
        let evicted = self.items.len().saturating_sub(self.capacity);
        self.items.truncate(self.capacity);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All items, newest first
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Titles of the `n` newest items, newest first
    pub fn newest_titles(&self, n: usize) -> Vec<&str> {
        self.items.iter().take(n).map(|i| i.title.as_str()).collect()
    }
}
