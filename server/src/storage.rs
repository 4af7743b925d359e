use {
    anyhow::{Context as _, Result, bail},
    fs_err::{create_dir_all, read_dir, remove_file},
    keepsake_protocol::{DateTimeUtc, EncryptedEnvelope, SiteId, endpoints::SiteResponse},
    parking_lot::Mutex,
    serde::{Deserialize, Serialize},
    std::{
        io::{self, BufWriter, Write},
        path::{Path, PathBuf},
    },
    tempfile::NamedTempFile,
    tracing::{debug, warn},
};

/// A page as kept on disk. Only the envelope and bookkeeping, never a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSite {
    pub id: SiteId,
    #[serde(flatten)]
    pub envelope: EncryptedEnvelope,
    pub created_at: DateTimeUtc,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub accepted_at: Option<DateTimeUtc>,
    #[serde(default)]
    pub expires_at: Option<DateTimeUtc>,
}

impl StoredSite {
    #[must_use]
    #[inline]
    pub fn is_expired(&self, now: DateTimeUtc) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    #[must_use]
    #[inline]
    pub fn to_response(&self) -> SiteResponse {
        SiteResponse {
            id: self.id.clone(),
            envelope: self.envelope.clone(),
            view_count: self.view_count,
            accepted: self.accepted_at.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(StoredSite),
    Expired,
    Missing,
}

/// One JSON file per page under `<root>/<first char of id>/<id>.json`.
///
/// Writes go through a temp file in `<root>/tmp` and are renamed into place.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    tmp: PathBuf,
    lock: Mutex<()>,
}

const TMP_DIR: &str = "tmp";
const EXTENSION: &str = "json";

fn site_dir(root: &Path, id: &SiteId) -> PathBuf {
    let shard = id.as_str().chars().next().unwrap_or('_');
    root.join(shard.to_string())
}

fn site_path(root: &Path, id: &SiteId) -> PathBuf {
    site_dir(root, id).join(format!("{id}.{EXTENSION}"))
}

fn read_site(path: &Path) -> Result<Option<StoredSite>> {
    match fs_err::read(path) {
        Ok(data) => Ok(Some(serde_json::from_slice(&data).with_context(|| {
            format!("corrupted site file {}", path.display())
        })?)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

impl Storage {
    pub fn new(root: PathBuf) -> Result<Self> {
        if !root.try_exists()? {
            bail!("storage root doesn't exist: {}", root.display());
        }

        let tmp = root.join(TMP_DIR);
        create_dir_all(&tmp)?;

        Ok(Self {
            root,
            tmp,
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.tmp.try_exists().unwrap_or(false)
    }

    fn write_temp(&self, site: &StoredSite) -> Result<NamedTempFile> {
        let file = NamedTempFile::new_in(&self.tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, site)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.as_file().sync_all()?;
        Ok(file)
    }

    /// Stores a new page. Returns `false` without writing if the id is taken.
    pub fn create(&self, site: &StoredSite) -> Result<bool> {
        let file = self.write_temp(site)?;
        create_dir_all(site_dir(&self.root, &site.id))?;
        let path = site_path(&self.root, &site.id);
        let _guard = self.lock.lock();
        match file.persist_noclobber(&path) {
            Ok(_) => Ok(true),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(id = %site.id, "site id already taken");
                Ok(false)
            }
            Err(err) => Err(err.error.into()),
        }
    }

    pub fn get(&self, id: &SiteId, now: DateTimeUtc) -> Result<Lookup> {
        let site = read_site(&site_path(&self.root, id))?;
        Ok(match site {
            None => Lookup::Missing,
            Some(site) if site.is_expired(now) => Lookup::Expired,
            Some(site) => Lookup::Found(site),
        })
    }

    /// Applies `f` to a live page and writes it back.
    pub fn update(
        &self,
        id: &SiteId,
        now: DateTimeUtc,
        f: impl FnOnce(&mut StoredSite),
    ) -> Result<Lookup> {
        let path = site_path(&self.root, id);
        let _guard = self.lock.lock();
        let Some(mut site) = read_site(&path)? else {
            return Ok(Lookup::Missing);
        };
        if site.is_expired(now) {
            return Ok(Lookup::Expired);
        }
        f(&mut site);
        self.write_temp(&site)?.persist(&path).map_err(|err| err.error)?;
        Ok(Lookup::Found(site))
    }

    /// All stored pages, expired ones included, ordered by creation time.
    pub fn list(&self) -> Result<Vec<StoredSite>> {
        let mut sites = Vec::new();
        self.for_each_file(|path| {
            if let Some(site) = read_site(path)? {
                sites.push(site);
            }
            Ok(())
        })?;
        sites.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(sites)
    }

    /// Deletes every page whose expiry has passed. Returns the number removed.
    pub fn remove_expired(&self, now: DateTimeUtc) -> Result<usize> {
        let mut removed: usize = 0;
        self.for_each_file(|path| {
            let _guard = self.lock.lock();
            match read_site(path) {
                Ok(Some(site)) if site.is_expired(now) => {
                    remove_file(path)?;
                    debug!(id = %site.id, "removed expired site");
                    removed = removed.saturating_add(1);
                }
                Ok(_) => {}
                Err(err) => warn!(?err, "skipping unreadable site file"),
            }
            Ok(())
        })?;
        Ok(removed)
    }

    fn for_each_file(&self, mut f: impl FnMut(&Path) -> Result<()>) -> Result<()> {
        for shard in read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() || shard.file_name() == TMP_DIR {
                continue;
            }
            for entry in read_dir(shard.path())? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == EXTENSION) {
                    f(&path)?;
                }
            }
        }
        Ok(())
    }
}
