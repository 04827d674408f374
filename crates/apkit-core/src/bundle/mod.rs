//! Multi-APK bundle archives.
//!
//! A [`Bundle`] is opened once: the embedded manifest is read and every APK
//! entry is classified, but no member is extracted or inspected yet. Member
//! metadata is computed on first request through a [`MemberRef`] and cached
//! for the bundle's lifetime.
//!
//! # Concurrency
//!
//! Each member has its own lock. Concurrent first requests for the same
//! member run the inspector once; requests for different members proceed in
//! parallel.
//!
//! # Cleanup
//!
//! Extracted members live in a private temporary directory owned by the
//! bundle. It is removed when the bundle is dropped; [`Bundle::close`] does
//! the same but reports failures.

pub mod classify;
pub mod manifest;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use apkit_schema::{MemberRole, PackageMetadata, PackageName, Sha256Digest};
use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::badging::{self, MalformedMetadata};
use crate::digest;
use crate::extract::{self, ExtractError, ExtractedFile};
use crate::inspect::Inspector;
use crate::process::ToolError;

pub use manifest::{BundleFormat, BundleManifest, DeclaredSplit, ManifestError};

/// Entry holding the launcher icon in XAPK and APKM archives.
const ICON_ENTRY: &str = "icon.png";

/// Errors from opening or reading a bundle.
#[derive(Error, Debug)]
pub enum BundleError {
    /// No usable manifest, or the member table has no single base.
    #[error("{}: unsupported bundle format: {reason}", .path.display())]
    UnsupportedFormat {
        /// Bundle file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// The zip structure could not be read.
    #[error("{}: corrupt archive: {source}", .path.display())]
    ArchiveCorrupt {
        /// Bundle file.
        path: PathBuf,
        /// Underlying zip error.
        #[source]
        source: ZipError,
    },

    /// Filesystem error outside the archive.
    #[error("{}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A member could not be unpacked.
    #[error("{}!{entry}: {source}", .path.display())]
    Extract {
        /// Bundle file.
        path: PathBuf,
        /// Member entry name.
        entry: String,
        /// Underlying error.
        #[source]
        source: ExtractError,
    },

    /// The inspection tool failed on a member.
    #[error("{}!{entry}: {source}", .path.display())]
    Tool {
        /// Bundle file.
        path: PathBuf,
        /// Member entry name.
        entry: String,
        /// Underlying error.
        #[source]
        source: ToolError,
    },

    /// A member's badging output lacked required fields.
    #[error("{}!{entry}: {source}", .path.display())]
    Malformed {
        /// Bundle file.
        path: PathBuf,
        /// Member entry name.
        entry: String,
        /// Underlying error.
        #[source]
        source: MalformedMetadata,
    },

    /// Members disagree with each other or with the manifest.
    #[error("{}: inconsistent bundle: {reason}", .path.display())]
    Inconsistent {
        /// Bundle file.
        path: PathBuf,
        /// The disagreement.
        reason: String,
    },
}

/// How a bundle is opened.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Produces badging dumps for extracted members.
    pub inspector: Arc<dyn Inspector>,
    /// Skip members whose inspection fails instead of failing the operation.
    pub skip_broken: bool,
}

impl BundleOptions {
    /// Options with the given inspector and strict member handling.
    pub fn new(inspector: Arc<dyn Inspector>) -> Self {
        Self {
            inspector,
            skip_broken: false,
        }
    }

    /// Set [`skip_broken`](Self::skip_broken).
    pub fn skip_broken(mut self, skip: bool) -> Self {
        self.skip_broken = skip;
        self
    }
}

/// One APK entry in the bundle's member table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleMember {
    /// Entry name inside the archive.
    pub entry: String,
    /// What the member contributes.
    pub role: MemberRole,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Digest declared by the manifest, if any.
    pub sha256: Option<Sha256Digest>,
}

/// A member that was skipped because it could not be inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenMember {
    /// Entry name inside the archive.
    pub entry: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Merged view over the base and its splits.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    /// Base scalars with set-valued fields unioned across members.
    pub metadata: PackageMetadata,
    /// Members left out because their inspection failed.
    pub skipped: Vec<BrokenMember>,
}

#[derive(Debug, Default)]
struct MemberSlot {
    extracted: Option<PathBuf>,
    metadata: Option<Arc<PackageMetadata>>,
}

/// An opened multi-APK bundle.
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    format: BundleFormat,
    manifest: BundleManifest,
    members: Vec<BundleMember>,
    slots: Vec<Mutex<MemberSlot>>,
    base: usize,
    has_icon: bool,
    workdir: TempDir,
    options: BundleOptions,
}

impl Bundle {
    /// Open `path`, read its manifest, and classify its members.
    ///
    /// Nothing is extracted or inspected here.
    ///
    /// # Errors
    ///
    /// - [`BundleError::ArchiveCorrupt`] if the zip cannot be read.
    /// - [`BundleError::UnsupportedFormat`] if no known manifest is present,
    ///   it cannot be parsed, or the archive does not hold exactly one base.
    /// - [`BundleError::Io`] if the file or the scratch directory cannot be
    ///   opened.
    pub fn open(path: impl AsRef<Path>, options: BundleOptions) -> Result<Self, BundleError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| BundleError::Io {
            path: path.clone(),
            source,
        };
        let corrupt = |source| BundleError::ArchiveCorrupt {
            path: path.clone(),
            source,
        };
        let unsupported = |reason: String| BundleError::UnsupportedFormat {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(io_err)?;
        let mut archive = ZipArchive::new(file).map_err(corrupt)?;

        let format = BundleFormat::detect(&path, archive.file_names())
            .ok_or_else(|| unsupported("no XAPK, APKM or APKS manifest found".to_string()))?;

        let (manifest_entry, raw) = read_manifest(&mut archive, format).map_err(corrupt)?;
        let manifest = manifest::parse(format, &raw)
            .map_err(|e| unsupported(format!("{manifest_entry}: {e}")))?;

        let mut entries = Vec::new();
        let mut has_icon = false;
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(corrupt)?;
            if entry.name() == ICON_ENTRY {
                has_icon = true;
            } else if entry.is_file() && classify::is_apk_entry(entry.name()) {
                entries.push((entry.name().to_string(), entry.size()));
            }
        }

        let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
        let roles = classify::classify(&names, manifest.base_entry(format).as_deref(), &manifest.splits);

        for declared in &manifest.splits {
            if !names.contains(&declared.file.as_str()) {
                warn!(entry = %declared.file, "manifest lists a split that is not in the archive");
            }
        }

        let bases: Vec<usize> = roles
            .iter()
            .enumerate()
            .filter(|(_, role)| **role == MemberRole::Base)
            .map(|(i, _)| i)
            .collect();
        let base = match bases.as_slice() {
            [base] => *base,
            [] => return Err(unsupported("no base APK found".to_string())),
            many => {
                return Err(unsupported(format!(
                    "expected one base APK, found {}",
                    many.len()
                )));
            }
        };

        let members: Vec<BundleMember> = entries
            .into_iter()
            .zip(roles)
            .map(|((entry, size), role)| {
                let sha256 = manifest
                    .splits
                    .iter()
                    .find(|d| d.file == entry)
                    .and_then(|d| d.sha256.clone());
                BundleMember {
                    entry,
                    role,
                    size,
                    sha256,
                }
            })
            .collect();

        let workdir = tempfile::Builder::new()
            .prefix("apkit-")
            .tempdir()
            .map_err(io_err)?;

        info!(
            path = %path.display(),
            %format,
            members = members.len(),
            "opened bundle"
        );
        for member in &members {
            debug!(entry = %member.entry, role = %member.role, "member");
        }

        Ok(Self {
            slots: members.iter().map(|_| Mutex::default()).collect(),
            path,
            format,
            manifest,
            members,
            base,
            has_icon,
            workdir,
            options,
        })
    }

    /// Path of the bundle file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container format.
    pub fn format(&self) -> BundleFormat {
        self.format
    }

    /// Bundle-level manifest facts.
    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// Options the bundle was opened with.
    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    /// Private scratch directory for extracted members.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Number of APK members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the bundle has no members (never true for an opened bundle).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All members in archive order.
    pub fn members(&self) -> impl Iterator<Item = MemberRef<'_>> {
        (0..self.members.len()).map(move |index| MemberRef {
            bundle: self,
            index,
        })
    }

    /// The base member.
    pub fn base(&self) -> MemberRef<'_> {
        MemberRef {
            bundle: self,
            index: self.base,
        }
    }

    /// Every member except the base.
    pub fn splits(&self) -> impl Iterator<Item = MemberRef<'_>> {
        self.members().filter(|m| m.index != self.base)
    }

    /// Look a member up by entry name.
    pub fn member(&self, entry: &str) -> Option<MemberRef<'_>> {
        self.members().find(|m| m.entry() == entry)
    }

    /// Package identifier declared by the manifest.
    pub fn package_name(&self) -> &PackageName {
        &self.manifest.package_name
    }

    /// Minimum SDK from the manifest when declared, else from the base.
    ///
    /// # Errors
    ///
    /// Fails only if the manifest is silent and the base cannot be inspected.
    pub fn min_sdk_version(&self) -> Result<Option<u32>, BundleError> {
        match self.manifest.min_sdk_version {
            Some(sdk) => Ok(Some(sdk)),
            None => Ok(self.base().metadata()?.min_sdk_version),
        }
    }

    /// Merge the base's metadata with every split's.
    ///
    /// Scalars come from the base. Sets are unioned; labels and icons the
    /// base lacks are filled from splits in archive order.
    ///
    /// # Errors
    ///
    /// Fails if the base cannot be inspected, or any split cannot be and
    /// `skip_broken` is off.
    pub fn aggregate(&self) -> Result<Aggregate, BundleError> {
        let mut metadata = (*self.base().metadata()?).clone();
        let mut skipped = Vec::new();

        for split in self.splits() {
            let meta = match split.metadata() {
                Ok(meta) => meta,
                Err(e) if self.options.skip_broken => {
                    warn!(error = %e, "skipping broken member");
                    skipped.push(BrokenMember {
                        entry: split.entry().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };
            merge_into(&mut metadata, &meta);
        }

        Ok(Aggregate { metadata, skipped })
    }

    /// Check that all members describe the same package and version as the
    /// base, that the base matches the manifest, and that declared digests
    /// match member contents.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Inconsistent`] on the first disagreement, or
    /// the error that prevented a member from being inspected.
    pub fn verify(&self) -> Result<(), BundleError> {
        let base = self.base().metadata()?;
        let inconsistent = |reason: String| BundleError::Inconsistent {
            path: self.path.clone(),
            reason,
        };

        let name = &self.manifest.package_name;
        if *name != base.package_name {
            return Err(inconsistent(format!(
                "manifest names {name}, base APK is {}",
                base.package_name
            )));
        }
        let code = self.manifest.version_code;
        if code != base.version_code {
            return Err(inconsistent(format!(
                "manifest version code {code}, base APK has {}",
                base.version_code
            )));
        }

        for member in self.members() {
            let meta = member.metadata()?;
            if meta.package_name != base.package_name || meta.version_code != base.version_code {
                return Err(inconsistent(format!(
                    "{} is {} ({}), base is {} ({})",
                    member.entry(),
                    meta.package_name,
                    meta.version_code,
                    base.package_name,
                    base.version_code
                )));
            }
            if let Some(expected) = &member.member().sha256 {
                let actual = member.sha256()?;
                if *expected != actual {
                    return Err(inconsistent(format!(
                        "{} has digest {actual}, manifest declares {expected}",
                        member.entry()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Unpack the whole archive into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Extract`] if any entry cannot be written.
    pub fn extract_all(&self, dest: &Path) -> Result<Vec<ExtractedFile>, BundleError> {
        extract::extract_zip(&self.path, dest).map_err(|source| BundleError::Extract {
            path: self.path.clone(),
            entry: "*".to_string(),
            source,
        })
    }

    /// Extract the packaged launcher icon, if the archive has one.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Extract`] if the icon exists but cannot be
    /// written.
    pub fn icon(&self) -> Result<Option<PathBuf>, BundleError> {
        if !self.has_icon {
            return Ok(None);
        }
        let file = extract::extract_entry(&self.path, ICON_ENTRY, self.workdir.path()).map_err(
            |source| BundleError::Extract {
                path: self.path.clone(),
                entry: ICON_ENTRY.to_string(),
                source,
            },
        )?;
        Ok(Some(file.absolute_path))
    }

    /// Remove the scratch directory now, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Io`] if the directory cannot be removed.
    pub fn close(self) -> Result<(), BundleError> {
        let Self { workdir, path, .. } = self;
        let dir = workdir.path().to_path_buf();
        workdir.close().map_err(|source| BundleError::Io { path: dir, source })?;
        debug!(path = %path.display(), "closed bundle");
        Ok(())
    }

    fn slot(&self, index: usize) -> MutexGuard<'_, MemberSlot> {
        // A panic mid-inspection leaves the slot empty or complete, never torn
        self.slots[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn merge_into(target: &mut PackageMetadata, split: &PackageMetadata) {
    target.permissions.extend(split.permissions.iter().cloned());
    target.libraries.extend(split.libraries.iter().cloned());
    target.features.extend(split.features.iter().cloned());
    target
        .supported_screens
        .extend(split.supported_screens.iter().cloned());
    target.locales.extend(split.locales.iter().cloned());
    target.densities.extend(split.densities.iter().copied());
    target.abis.extend(split.abis.iter().cloned());
    for (locale, label) in &split.labels {
        target
            .labels
            .entry(locale.clone())
            .or_insert_with(|| label.clone());
    }
    for (density, icon) in &split.icons {
        target.icons.entry(*density).or_insert_with(|| icon.clone());
    }
}

/// Read the first manifest entry the format defines that the archive holds.
fn read_manifest(
    archive: &mut ZipArchive<File>,
    format: BundleFormat,
) -> Result<(&'static str, String), ZipError> {
    let name = format
        .manifest_entries()
        .iter()
        .copied()
        .find(|name| archive.file_names().any(|f| f == *name))
        .ok_or(ZipError::FileNotFound)?;
    let mut raw = String::new();
    archive.by_name(name)?.read_to_string(&mut raw)?;
    Ok((name, raw))
}

/// Borrowed handle on one member of an open [`Bundle`].
#[derive(Debug, Clone, Copy)]
pub struct MemberRef<'a> {
    bundle: &'a Bundle,
    index: usize,
}

impl<'a> MemberRef<'a> {
    /// The member table row.
    pub fn member(&self) -> &'a BundleMember {
        &self.bundle.members[self.index]
    }

    /// Entry name inside the archive.
    pub fn entry(&self) -> &'a str {
        &self.member().entry
    }

    /// Classified role.
    pub fn role(&self) -> &'a MemberRole {
        &self.member().role
    }

    /// Uncompressed size in bytes.
    pub fn size(&self) -> u64 {
        self.member().size
    }

    /// Whether this is the base member.
    pub fn is_base(&self) -> bool {
        self.index == self.bundle.base
    }

    /// Extract the member into the bundle's scratch directory.
    ///
    /// Repeated calls return the same path without re-extracting.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Extract`] if the entry cannot be unpacked.
    pub fn extract(&self) -> Result<PathBuf, BundleError> {
        let mut slot = self.bundle.slot(self.index);
        self.extract_locked(&mut slot)
    }

    fn extract_locked(&self, slot: &mut MemberSlot) -> Result<PathBuf, BundleError> {
        if let Some(path) = &slot.extracted {
            if path.exists() {
                return Ok(path.clone());
            }
        }
        let file = extract::extract_entry(&self.bundle.path, self.entry(), self.bundle.workdir.path())
            .map_err(|source| BundleError::Extract {
                path: self.bundle.path.clone(),
                entry: self.entry().to_string(),
                source,
            })?;
        slot.extracted = Some(file.absolute_path.clone());
        Ok(file.absolute_path)
    }

    /// Parsed metadata, inspecting the member on first use.
    ///
    /// The result is cached; failures are not, so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Extract`], [`BundleError::Tool`], or
    /// [`BundleError::Malformed`] depending on which step failed.
    pub fn metadata(&self) -> Result<Arc<PackageMetadata>, BundleError> {
        let mut slot = self.bundle.slot(self.index);
        if let Some(meta) = &slot.metadata {
            return Ok(Arc::clone(meta));
        }

        let path = self.extract_locked(&mut slot)?;
        let raw = self
            .bundle
            .options
            .inspector
            .dump_badging(&path)
            .map_err(|source| BundleError::Tool {
                path: self.bundle.path.clone(),
                entry: self.entry().to_string(),
                source,
            })?;
        let meta = Arc::new(badging::parse(&raw).map_err(|source| BundleError::Malformed {
            path: self.bundle.path.clone(),
            entry: self.entry().to_string(),
            source,
        })?);

        slot.metadata = Some(Arc::clone(&meta));
        Ok(meta)
    }

    /// SHA-256 of the member's uncompressed bytes, streamed from the archive.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::ArchiveCorrupt`] if the entry cannot be read.
    pub fn sha256(&self) -> Result<Sha256Digest, BundleError> {
        let mut archive = self.archive()?;
        let entry = archive.by_name(self.entry()).map_err(|e| self.corrupt(e))?;
        digest::sha256_reader(entry).map_err(|e| self.corrupt(ZipError::Io(e)))
    }

    /// MD5 of the member's uncompressed bytes, as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::ArchiveCorrupt`] if the entry cannot be read.
    pub fn md5(&self) -> Result<String, BundleError> {
        let mut archive = self.archive()?;
        let entry = archive.by_name(self.entry()).map_err(|e| self.corrupt(e))?;
        digest::md5_reader(entry).map_err(|e| self.corrupt(ZipError::Io(e)))
    }

    fn archive(&self) -> Result<ZipArchive<File>, BundleError> {
        let file = File::open(&self.bundle.path).map_err(|source| BundleError::Io {
            path: self.bundle.path.clone(),
            source,
        })?;
        ZipArchive::new(file).map_err(|e| self.corrupt(e))
    }

    fn corrupt(&self, source: ZipError) -> BundleError {
        BundleError::ArchiveCorrupt {
            path: self.bundle.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::tests::write_zip;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Inspector that serves canned dumps keyed by file name and counts calls.
    #[derive(Debug, Default)]
    pub(crate) struct FakeInspector {
        pub(crate) dumps: HashMap<String, String>,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeInspector {
        pub(crate) fn with(mut self, file: &str, dump: &str) -> Self {
            self.dumps.insert(file.to_string(), dump.to_string());
            self
        }
    }

    impl Inspector for FakeInspector {
        fn dump_badging(&self, apk: &Path) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Widen the race window for the once-only test
            std::thread::sleep(std::time::Duration::from_millis(20));
            let name = apk.file_name().unwrap().to_string_lossy().to_string();
            self.dumps
                .get(&name)
                .cloned()
                .ok_or_else(|| ToolError::Spawn {
                    command: format!("aapt dump badging {name}"),
                    source: io::Error::other("no canned dump"),
                })
        }
    }

    pub(crate) fn dump(package: &str, code: u64, extra: &str) -> String {
        format!("package: name='{package}' versionCode='{code}' versionName='1.0'\n{extra}")
    }

    /// APKM-style bundle: base (minSdk 21), arm64 split, English split.
    pub(crate) fn sample_bundle(dir: &Path) -> (PathBuf, Arc<FakeInspector>) {
        let path = dir.join("app.apkm");
        write_zip(
            &path,
            &[
                (
                    "info.json",
                    br#"{"pname": "org.example", "versioncode": 7, "min_api": 21}"#,
                ),
                ("base.apk", b"base-bytes"),
                ("split_config.arm64_v8a.apk", b"arm64-bytes"),
                ("split_config.en.apk", b"en-bytes"),
                ("icon.png", b"png"),
            ],
        );
        let inspector = FakeInspector::default()
            .with(
                "base.apk",
                &dump(
                    "org.example",
                    7,
                    "sdkVersion:'21'\nuses-permission: name='android.permission.INTERNET'\nlocales: 'en' 'de'",
                ),
            )
            .with(
                "split_config.arm64_v8a.apk",
                &dump(
                    "org.example",
                    7,
                    "native-code: 'arm64-v8a'\nuses-permission: name='android.permission.CAMERA'",
                ),
            )
            .with(
                "split_config.en.apk",
                &dump("org.example", 7, "application-label-en:'Example'"),
            );
        (path, Arc::new(inspector))
    }

    #[test]
    fn test_open_classifies_members() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector.clone())).unwrap();

        assert_eq!(bundle.format(), BundleFormat::Apkm);
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.base().entry(), "base.apk");
        assert_eq!(
            bundle.member("split_config.en.apk").unwrap().role(),
            &MemberRole::Language("en".into())
        );
        assert_eq!(bundle.manifest().min_sdk_version, Some(21));
        // Opening inspects nothing
        assert_eq!(inspector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_metadata_is_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector.clone())).unwrap();

        let first = bundle.base().metadata().unwrap();
        let second = bundle.base().metadata().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.package_name, "org.example");
        assert_eq!(inspector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_access_inspects_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector.clone())).unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let meta = bundle.base().metadata().unwrap();
                    assert_eq!(meta.version_code, 7);
                });
            }
        });
        assert_eq!(inspector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, _) = sample_bundle(tmp.path());
        let inspector = Arc::new(FakeInspector::default());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector.clone())).unwrap();

        assert!(matches!(
            bundle.base().metadata(),
            Err(BundleError::Tool { .. })
        ));
        assert!(bundle.base().metadata().is_err());
        assert_eq!(inspector.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_malformed_member() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, _) = sample_bundle(tmp.path());
        let inspector = Arc::new(FakeInspector::default().with("base.apk", "sdkVersion:'21'"));
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let err = bundle.base().metadata().unwrap_err();
        assert!(matches!(err, BundleError::Malformed { ref entry, .. } if entry == "base.apk"));
        assert!(err.to_string().contains("base.apk"));
    }

    #[test]
    fn test_aggregate_unions_splits() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();

        let agg = bundle.aggregate().unwrap();
        assert!(agg.skipped.is_empty());
        assert_eq!(agg.metadata.permissions.len(), 2);
        assert!(agg.metadata.abis.contains(&apkit_schema::Abi::Arm64V8a));
        assert_eq!(agg.metadata.labels.get("en").map(String::as_str), Some("Example"));
        assert_eq!(agg.metadata.min_sdk_version, Some(21));
    }

    #[test]
    fn test_aggregate_skip_broken() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, _) = sample_bundle(tmp.path());
        let inspector = Arc::new(
            FakeInspector::default().with("base.apk", &dump("org.example", 7, "")),
        );

        let strict = Bundle::open(&path, BundleOptions::new(inspector.clone())).unwrap();
        assert!(strict.aggregate().is_err());

        let lenient =
            Bundle::open(&path, BundleOptions::new(inspector).skip_broken(true)).unwrap();
        let agg = lenient.aggregate().unwrap();
        assert_eq!(agg.skipped.len(), 2);
        assert_eq!(agg.metadata.package_name, "org.example");
    }

    #[test]
    fn test_verify() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        bundle.verify().unwrap();

        let inspector = Arc::new(
            FakeInspector::default()
                .with("base.apk", &dump("org.example", 7, ""))
                .with("split_config.arm64_v8a.apk", &dump("org.example", 6, ""))
                .with("split_config.en.apk", &dump("org.example", 7, "")),
        );
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        let err = bundle.verify().unwrap_err();
        assert!(matches!(err, BundleError::Inconsistent { .. }));
        assert!(err.to_string().contains("split_config.arm64_v8a.apk"));
    }

    #[test]
    fn test_verify_declared_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("app.xapk");
        let good = digest::sha256_reader(&b"base-bytes"[..]).unwrap();
        let manifest = format!(
            r#"{{"package_name": "org.example", "version_code": "7",
                "split_apks": [
                    {{"file": "org.example.apk", "id": "base", "sha256": "{good}"}},
                    {{"file": "config.xxhdpi.apk", "id": "config.xxhdpi", "sha256": "{}"}}
                ]}}"#,
            "0".repeat(64)
        );
        write_zip(
            &path,
            &[
                ("manifest.json", manifest.as_bytes()),
                ("org.example.apk", b"base-bytes"),
                ("config.xxhdpi.apk", b"density-bytes"),
            ],
        );
        let inspector = Arc::new(
            FakeInspector::default()
                .with("org.example.apk", &dump("org.example", 7, ""))
                .with("config.xxhdpi.apk", &dump("org.example", 7, "")),
        );
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        assert_eq!(bundle.base().sha256().unwrap(), good);
        assert_eq!(
            bundle.base().md5().unwrap(),
            digest::md5_reader(&b"base-bytes"[..]).unwrap()
        );
        let err = bundle.verify().unwrap_err();
        assert!(err.to_string().contains("config.xxhdpi.apk"));
    }

    #[test]
    fn test_unsupported_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plain.zip");
        write_zip(&path, &[("readme.txt", b"hi")]);
        let err = Bundle::open(&path, BundleOptions::new(Arc::new(FakeInspector::default())))
            .unwrap_err();
        assert!(matches!(err, BundleError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_no_single_base() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("odd.apks");
        write_zip(
            &path,
            &[
                ("meta.sai_v2.json", br#"{"package": "org.example", "version_code": 7}"#),
                ("one.apk", b"1"),
                ("two.apk", b"2"),
            ],
        );
        let err = Bundle::open(&path, BundleOptions::new(Arc::new(FakeInspector::default())))
            .unwrap_err();
        assert!(err.to_string().contains("no base APK"));
    }

    #[test]
    fn test_manifest_without_required_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.apkm");
        write_zip(&path, &[("info.json", b"{}"), ("base.apk", b"x")]);
        let err = Bundle::open(&path, BundleOptions::new(Arc::new(FakeInspector::default())))
            .unwrap_err();
        assert!(matches!(err, BundleError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("`pname`"));

        let path = tmp.path().join("junk.apkm");
        write_zip(
            &path,
            &[
                ("info.json", br#"{"pname": "a.b", "versioncode": "v1"}"#),
                ("base.apk", b"x"),
            ],
        );
        let err = Bundle::open(&path, BundleOptions::new(Arc::new(FakeInspector::default())))
            .unwrap_err();
        assert!(err.to_string().contains("`versioncode`"));
    }

    #[test]
    fn test_corrupt_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.xapk");
        std::fs::write(&path, b"PK but not really").unwrap();
        let err = Bundle::open(&path, BundleOptions::new(Arc::new(FakeInspector::default())))
            .unwrap_err();
        assert!(matches!(err, BundleError::ArchiveCorrupt { .. }));
    }

    #[test]
    fn test_bad_manifest_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.xapk");
        write_zip(&path, &[("manifest.json", b"{oops"), ("base.apk", b"x")]);
        let err = Bundle::open(&path, BundleOptions::new(Arc::new(FakeInspector::default())))
            .unwrap_err();
        assert!(matches!(err, BundleError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn test_workdir_removed_on_drop_and_close() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());

        let bundle = Bundle::open(&path, BundleOptions::new(inspector.clone())).unwrap();
        let extracted = bundle.base().extract().unwrap();
        assert!(extracted.exists());
        let workdir = bundle.workdir().to_path_buf();
        drop(bundle);
        assert!(!workdir.exists());

        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();
        bundle.base().metadata().unwrap();
        let workdir = bundle.workdir().to_path_buf();
        bundle.close().unwrap();
        assert!(!workdir.exists());
    }

    #[test]
    fn test_icon_and_extract_all() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, inspector) = sample_bundle(tmp.path());
        let bundle = Bundle::open(&path, BundleOptions::new(inspector)).unwrap();

        let icon = bundle.icon().unwrap().unwrap();
        assert_eq!(std::fs::read(icon).unwrap(), b"png");

        let out = tmp.path().join("out");
        let files = bundle.extract_all(&out).unwrap();
        assert_eq!(files.len(), 5);
        assert!(out.join("split_config.en.apk").exists());
    }
}
