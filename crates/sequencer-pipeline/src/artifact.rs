//! Content-addressed cache for proving keys, verifying keys and circuit parameter blobs (§4.9).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::ArtifactError;

/// Which of the four recursion-tower stages an artifact belongs to, and what kind of blob it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A Groth16 proving key.
    ProvingKey,
    /// A Groth16 verifying key.
    VerifyingKey,
    /// A serialized circuit-parameter blob (constraint system shape, not key material).
    CircuitParams,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProvingKey => "proving-key",
            Self::VerifyingKey => "verifying-key",
            Self::CircuitParams => "circuit-params",
        };
        f.write_str(name)
    }
}

/// A content-addressed reference to an artifact blob: its expected SHA-256 and what kind it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Expected SHA-256 of the blob.
    pub sha256: [u8; 32],
    /// The artifact's kind, for cache-path disambiguation and logging only (the hash alone
    /// already uniquely addresses the bytes).
    pub kind: ArtifactKind,
}

impl ArtifactRef {
    /// Build a reference from already-known bytes, hashing them locally.
    #[must_use]
    pub fn for_bytes(bytes: &[u8], kind: ArtifactKind) -> Self {
        let sha256 = Sha256::digest(bytes).into();
        Self { sha256, kind }
    }

    /// Hex-encoded SHA-256, the cache filename under `<BaseDir>`.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.sha256)
    }
}

/// A source that can produce an artifact's bytes when the local cache is missing or corrupt.
///
/// The real transport (HTTPS fetch from a trusted artifact host) is an external collaborator,
/// not part of this crate; only the trait and a filesystem-backed implementation live here.
pub trait ArtifactSource: Send + Sync {
    /// Fetch the bytes for `artifact_ref`.
    ///
    /// # Errors
    /// Returns [`ArtifactError::NotFound`] if this source has nothing for the reference, or
    /// [`ArtifactError::Io`] if retrieval itself fails.
    fn fetch(&self, artifact_ref: &ArtifactRef) -> Result<Vec<u8>, ArtifactError>;
}

/// An [`ArtifactSource`] that serves blobs already present in a directory, keyed by the same
/// `<hexhash>` convention as the cache itself. Used by tests, and by deployments that pre-seed
/// artifacts out of band instead of fetching them over the network.
#[derive(Debug, Clone)]
pub struct FsArtifactSource {
    dir: PathBuf,
}

impl FsArtifactSource {
    /// Serve artifacts from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactSource for FsArtifactSource {
    fn fetch(&self, artifact_ref: &ArtifactRef) -> Result<Vec<u8>, ArtifactError> {
        let path = self.dir.join(artifact_ref.hex());
        fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(artifact_ref.hex())
            } else {
                ArtifactError::Io(err)
            }
        })
    }
}

/// Resolves [`ArtifactRef`]s to local bytes, verifying integrity on every open and re-fetching
/// through an injected [`ArtifactSource`] on a mismatch (§4.9).
#[derive(Clone)]
pub struct ArtifactCache<S> {
    base_dir: PathBuf,
    source: S,
}

impl<S: ArtifactSource> ArtifactCache<S> {
    /// Open a cache rooted at `base_dir`, creating it if absent.
    ///
    /// # Errors
    /// Returns [`ArtifactError::Io`] if `base_dir` cannot be created.
    pub fn open(base_dir: impl Into<PathBuf>, source: S) -> Result<Self, ArtifactError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir, source })
    }

    /// The path an artifact would be cached at, whether or not it exists yet.
    #[must_use]
    pub fn path_for(&self, artifact_ref: &ArtifactRef) -> PathBuf {
        self.base_dir.join(artifact_ref.hex())
    }

    /// Resolve `artifact_ref` to its bytes: read the on-disk blob if present and matching, else
    /// fetch it through the configured source and cache the result.
    ///
    /// # Errors
    /// Returns [`ArtifactError::HashMismatch`] if a freshly fetched blob still doesn't match, or
    /// whatever the source itself raises.
    pub fn open_bytes(&self, artifact_ref: &ArtifactRef) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_for(artifact_ref);
        if let Ok(bytes) = fs::read(&path) {
            if verify(&bytes, artifact_ref) {
                return Ok(bytes);
            }
            tracing::warn!(
                artifact = %artifact_ref.hex(),
                kind = %artifact_ref.kind,
                "cached artifact failed hash verification, re-fetching",
            );
        }

        let bytes = self.source.fetch(artifact_ref)?;
        if !verify(&bytes, artifact_ref) {
            return Err(ArtifactError::HashMismatch {
                expected: artifact_ref.hex(),
                got: hex::encode(Sha256::digest(&bytes)),
            });
        }
        fs::write(&path, &bytes)?;
        Ok(bytes)
    }
}

fn verify(bytes: &[u8], artifact_ref: &ArtifactRef) -> bool {
    Sha256::digest(bytes).as_slice() == artifact_ref.sha256
}

/// Default artifact cache directory, `<HOME>/.cache/davinci-artifacts` (§4.9, §6), used when
/// [`crate::config::NodeConfig::artifact_base_dir`] is unset.
#[must_use]
pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache")
        .join("davinci-artifacts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_bytes_reads_a_valid_cached_blob() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact_ref = ArtifactRef::for_bytes(b"hello", ArtifactKind::VerifyingKey);
        fs::write(dir.path().join(artifact_ref.hex()), b"hello").expect("seed cache");

        let cache = ArtifactCache::open(dir.path(), FsArtifactSource::new(dir.path())).expect("open cache");
        assert_eq!(cache.open_bytes(&artifact_ref).expect("open"), b"hello");
    }

    #[test]
    fn a_corrupt_cached_blob_is_refetched_from_the_source() {
        let cache_dir = tempfile::tempdir().expect("cache dir");
        let source_dir = tempfile::tempdir().expect("source dir");
        let artifact_ref = ArtifactRef::for_bytes(b"good bytes", ArtifactKind::ProvingKey);

        fs::write(cache_dir.path().join(artifact_ref.hex()), b"corrupted").expect("seed corrupt cache");
        fs::write(source_dir.path().join(artifact_ref.hex()), b"good bytes").expect("seed source");

        let cache =
            ArtifactCache::open(cache_dir.path(), FsArtifactSource::new(source_dir.path())).expect("open cache");
        assert_eq!(cache.open_bytes(&artifact_ref).expect("refetch"), b"good bytes");
    }

    #[test]
    fn a_missing_artifact_from_an_empty_source_is_reported() {
        let cache_dir = tempfile::tempdir().expect("cache dir");
        let source_dir = tempfile::tempdir().expect("source dir");
        let artifact_ref = ArtifactRef::for_bytes(b"nonexistent", ArtifactKind::CircuitParams);

        let cache =
            ArtifactCache::open(cache_dir.path(), FsArtifactSource::new(source_dir.path())).expect("open cache");
        let err = cache.open_bytes(&artifact_ref).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }
}
