use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::ImageResult;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Extracts a gzip-compressed tar layer into `destination`, preserving
/// symlinks as symlinks and each entry's tar header mode bits verbatim.
///
/// Runs on a blocking thread since `tar`/`flate2` are synchronous; callers
/// in async contexts should wrap this in `tokio::task::spawn_blocking`.
pub fn extract_layer(archive_path: &Path, destination: &Path) -> ImageResult<()> {
    std::fs::create_dir_all(destination)?;

    let file = std::fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_unpack_xattrs(true);

    // Whiteout markers (`.wh.*`, `.wh..wh..opq`) are ordinary tar entries;
    // unpacking them verbatim is exactly what vfs::Overlay expects to find
    // when it scans a layer directory for them.
    for entry in archive.entries()? {
        let mut entry = entry?;
        entry.unpack_in(destination)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn build_layer(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let archive_path = dir.join("layer.tar.gz");
        let file = std::fs::File::create(&archive_path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap().flush().unwrap();
        archive_path
    }

    #[test]
    fn extracts_regular_files_and_whiteout_markers() {
        let dir = TempDir::new().unwrap();
        let archive = build_layer(
            dir.path(),
            &[("a.txt", b"hello"), (".wh.deleted", b"")],
        );

        let destination = dir.path().join("out");
        extract_layer(&archive, &destination).unwrap();

        assert_eq!(
            std::fs::read_to_string(destination.join("a.txt")).unwrap(),
            "hello"
        );
        assert!(destination.join(".wh.deleted").exists());
    }

    #[test]
    fn preserves_symlink_entries_as_symlinks() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("layer.tar.gz");
        let file = std::fs::File::create(&archive_path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_cksum();
        builder
            .append_link(&mut header, "link.txt", "a.txt")
            .unwrap();
        builder.into_inner().unwrap().flush().unwrap();

        let destination = dir.path().join("out");
        extract_layer(&archive_path, &destination).unwrap();

        let metadata = std::fs::symlink_metadata(destination.join("link.txt")).unwrap();
        assert!(metadata.file_type().is_symlink());
        assert_eq!(
            std::fs::read_link(destination.join("link.txt")).unwrap(),
            PathBuf::from("a.txt")
        );
    }
}
