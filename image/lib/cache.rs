use std::{path::PathBuf, sync::Arc};

use futures::StreamExt;
use oci_spec::image::{Digest, ImageManifest};
use sha2::{Digest as _, Sha256};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use uuid::Uuid;
use vfs::{
    implementations::{Native, Overlay, Prefixed},
    Filesystem,
};

use crate::{
    reference::ReferenceSelector, registry::select_platform_manifest, ImageError, ImageResult,
    Reference, Registry,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const LAYERS_SUBDIR: &str = "layers";
const MANIFESTS_SUBDIR: &str = "manifests";
const TAG_SUBDIR: &str = "tag";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A content-addressed on-disk cache of OCI manifests and expanded
/// layers, rooted at `<cache_base>/jk`.
///
/// Layer directories are shared by content address across every image
/// that references them; a layer directory on disk is either absent or a
/// fully expanded, verified copy of that layer (never partial), enforced
/// by always extracting into a sibling temporary directory and renaming
/// into place only on success.
#[derive(Debug)]
pub struct Cache {
    base: PathBuf,
    registry: Arc<dyn Registry>,
}

impl Cache {
    /// Roots a cache at `<cache_base>/jk`, using `registry` to fetch
    /// manifests and blobs on demand.
    pub fn new(cache_base: PathBuf, registry: Arc<dyn Registry>) -> Self {
        Self {
            base: cache_base.join("jk"),
            registry,
        }
    }

    fn layer_path(&self, digest: &Digest) -> PathBuf {
        self.base
            .join(LAYERS_SUBDIR)
            .join(digest.algorithm().to_string())
            .join(digest.digest())
    }

    fn manifest_digest_path(&self, reference: &Reference, digest: &Digest) -> PathBuf {
        self.base
            .join(MANIFESTS_SUBDIR)
            .join(reference.get_registry())
            .join(reference.get_repository())
            .join(digest.to_string())
    }

    fn manifest_tag_path(&self, reference: &Reference, tag: &str) -> PathBuf {
        self.base
            .join(MANIFESTS_SUBDIR)
            .join(reference.get_registry())
            .join(reference.get_repository())
            .join(TAG_SUBDIR)
            .join(tag)
    }

    /// Returns the manifest path a reference currently resolves to: the
    /// tag symlink's target if the reference is a tag, the digest path
    /// otherwise.
    fn manifest_path(&self, reference: &Reference) -> PathBuf {
        match reference.get_selector() {
            ReferenceSelector::Tag { tag, .. } => self.manifest_tag_path(reference, tag),
            ReferenceSelector::Digest(digest) => self.manifest_digest_path(reference, digest),
        }
    }

    /// Ensures `reference` is present in the cache, fetching it from the
    /// registry if necessary. A no-op if the manifest is already cached.
    pub async fn download(&self, reference: &Reference) -> ImageResult<()> {
        let manifest_path = self.manifest_path(reference);
        if fs::try_exists(&manifest_path).await? {
            return Ok(());
        }

        let selector_str = match reference.get_selector() {
            ReferenceSelector::Tag { tag, .. } => tag.clone(),
            ReferenceSelector::Digest(digest) => digest.to_string(),
        };

        let index = self
            .registry
            .fetch_index(
                reference.get_registry(),
                reference.get_repository(),
                &selector_str,
            )
            .await?;
        let manifest_desc =
            select_platform_manifest(&index).ok_or(ImageError::ManifestNotFound)?;

        let manifest = self
            .registry
            .fetch_manifest(
                reference.get_registry(),
                reference.get_repository(),
                manifest_desc.digest(),
            )
            .await?;

        if let ReferenceSelector::Tag { tag, .. } = reference.get_selector() {
            let digest_path = self.manifest_digest_path(reference, manifest_desc.digest());
            if fs::try_exists(&digest_path).await? {
                self.link_tag(reference, tag, &digest_path).await?;
                return Ok(());
            }
        }

        for layer in manifest.layers() {
            self.download_layer(reference, layer.digest()).await?;
        }

        self.write_manifest(&self.manifest_digest_path(reference, manifest_desc.digest()), &manifest)
            .await?;

        if let ReferenceSelector::Tag { tag, .. } = reference.get_selector() {
            let digest_path = self.manifest_digest_path(reference, manifest_desc.digest());
            self.link_tag(reference, tag, &digest_path).await?;
        }

        Ok(())
    }

    async fn download_layer(&self, reference: &Reference, digest: &Digest) -> ImageResult<()> {
        let final_path = self.layer_path(digest);
        if fs::try_exists(&final_path).await? {
            return Ok(());
        }

        let parent = final_path
            .parent()
            .expect("layer path always has a parent")
            .to_path_buf();
        fs::create_dir_all(&parent).await?;

        let temp_archive = parent.join(format!(".download-{}", Uuid::new_v4()));
        self.fetch_blob_to_file(reference, digest, &temp_archive)
            .await?;

        let temp_dir = parent.join(format!(".extract-{}", Uuid::new_v4()));
        let extract_target = temp_dir.clone();
        let archive_for_extract = temp_archive.clone();
        tokio::task::spawn_blocking(move || crate::extract::extract_layer(&archive_for_extract, &extract_target))
            .await
            .map_err(|e| ImageError::custom(anyhow::anyhow!("layer extraction task panicked: {e}")))??;

        fs::remove_file(&temp_archive).await.ok();

        match fs::rename(&temp_dir, &final_path).await {
            Ok(()) => Ok(()),
            Err(err) => {
                fs::remove_dir_all(&temp_dir).await.ok();
                Err(err.into())
            }
        }
    }

    async fn fetch_blob_to_file(
        &self,
        reference: &Reference,
        digest: &Digest,
        destination: &std::path::Path,
    ) -> ImageResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(destination)
            .await?;

        let mut stream = self
            .registry
            .fetch_blob(
                reference.get_registry(),
                reference.get_repository(),
                digest,
                0,
            )
            .await?;

        let mut hasher = Sha256::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        let actual = hex::encode(hasher.finalize());
        if digest.algorithm().to_string() == "sha256" && actual != digest.digest() {
            fs::remove_file(destination).await.ok();
            return Err(ImageError::DigestMismatch {
                repository: reference.get_repository().clone(),
                digest: digest.to_string(),
                actual,
            });
        }

        Ok(())
    }

    async fn write_manifest(
        &self,
        path: &std::path::Path,
        manifest: &ImageManifest,
    ) -> ImageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&temp_path, serde_json::to_vec_pretty(manifest)?).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn link_tag(
        &self,
        reference: &Reference,
        tag: &str,
        digest_path: &std::path::Path,
    ) -> ImageResult<()> {
        let tag_path = self.manifest_tag_path(reference, tag);
        if let Some(parent) = tag_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::remove_file(&tag_path).await.ok();

        #[cfg(unix)]
        tokio::fs::symlink(digest_path, &tag_path).await?;
        #[cfg(not(unix))]
        fs::copy(digest_path, &tag_path).await.map(|_| ())?;

        Ok(())
    }

    /// Opens a previously downloaded reference as a [`vfs::Filesystem`]:
    /// an [`Overlay`] of the manifest's layer directories (reversed, so
    /// the uppermost layer is the last one applied by the manifest),
    /// wrapped with a `<reference>!` prefix for dependency recording.
    pub async fn open_as_filesystem(
        &self,
        reference: &Reference,
    ) -> ImageResult<Arc<dyn Filesystem>> {
        let manifest_path = self.manifest_path(reference);
        let bytes = fs::read(&manifest_path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ImageError::Registry(format!("image not downloaded: {reference}"))
            } else {
                ImageError::from(err)
            }
        })?;
        let manifest: ImageManifest = serde_json::from_slice(&bytes)?;

        let mut layers = Vec::with_capacity(manifest.layers().len());
        for layer in manifest.layers().iter().rev() {
            let layer_path = self.layer_path(layer.digest());
            let metadata = fs::metadata(&layer_path).await.map_err(|_| {
                ImageError::LayerNotInCache(layer_path.display().to_string())
            })?;
            if !metadata.is_dir() {
                return Err(ImageError::LayerNotInCache(layer_path.display().to_string()));
            }
            layers.push(Arc::new(Native::new(layer_path)) as Arc<dyn Filesystem>);
        }

        let overlay = Overlay::new(layers)?;
        Ok(Arc::new(Prefixed::user(
            format!("{reference}!"),
            Arc::new(overlay),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_and_manifest_paths_follow_cache_layout() {
        let cache = Cache::new(
            PathBuf::from("/home/user/.cache"),
            Arc::new(crate::registry::DistributionClient::new()),
        );
        let digest: Digest = "sha256:deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
            .parse()
            .unwrap();
        let layer_path = cache.layer_path(&digest);
        assert_eq!(
            layer_path,
            PathBuf::from(
                "/home/user/.cache/jk/layers/sha256/deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
            )
        );

        let reference: Reference = "docker.io/library/alpine:3.12".parse().unwrap();
        let tag_path = cache.manifest_tag_path(&reference, "3.12");
        assert_eq!(
            tag_path,
            PathBuf::from("/home/user/.cache/jk/manifests/docker.io/library/alpine/tag/3.12")
        );
    }
}
