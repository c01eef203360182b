use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use tar::{Builder, Header};
use walkdir::WalkDir;

use crate::constants::{ARCHIVE_EXTENSION, ARCHIVE_INFIX};

/// Root directory name inside the archive, `<product>-supportpkg-<epoch>`
pub fn archive_root(product: &str, epoch_secs: u64) -> String {
    format!("{}-{}-{}", product, ARCHIVE_INFIX, epoch_secs)
}

/// Archive file name, `<product>-supportpkg-<epoch>.tar.gz`
pub fn archive_file_name(product: &str, epoch_secs: u64) -> String {
    format!("{}.{}", archive_root(product, epoch_secs), ARCHIVE_EXTENSION)
}

/// Packs `workspace` into a gzip tar in `output_dir`, then removes it.
///
/// The archive is created exclusively; an existing file with the same name
/// is an error. When archiving fails the workspace is kept.
pub fn build_archive(workspace: &Path, product: &str, output_dir: &Path) -> Result<PathBuf> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_secs();

    let dest = output_dir.join(archive_file_name(product, epoch));
    write_archive(workspace, &dest, &archive_root(product, epoch))?;

    if let Err(e) = fs::remove_dir_all(workspace) {
        warn!("Failed to remove workspace {}: {}", workspace.display(), e);
    } else {
        debug!("Removed workspace {}", workspace.display());
    }

    Ok(dest)
}

/// Writes the contents of `workspace` to `dest`, every entry prefixed by
/// `root_prefix/`.
///
/// Directories and regular files are stored; other entry types are skipped.
pub fn write_archive(workspace: &Path, dest: &Path, root_prefix: &str) -> Result<()> {
    if !workspace.is_dir() {
        bail!("Workspace {} is not a directory", workspace.display());
    }

    let start = Instant::now();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .context(format!("Failed to create archive {}", dest.display()))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    let mut entries = 0usize;
    for entry in WalkDir::new(workspace).follow_links(false).sort_by_file_name() {
        let entry = entry.context("Failed to walk workspace")?;
        let path = entry.path();
        let file_type = entry.file_type();

        if !file_type.is_dir() && !file_type.is_file() {
            debug!("Skipping {} (not a file or directory)", path.display());
            continue;
        }

        let relative = path
            .strip_prefix(workspace)
            .context(format!("Failed to compute relative path for {}", path.display()))?;
        let name = entry_name(root_prefix, relative, file_type.is_dir());

        let metadata = entry
            .metadata()
            .context(format!("Failed to read metadata for {}", path.display()))?;
        let mut header = Header::new_gnu();
        header.set_metadata(&metadata);

        if file_type.is_dir() {
            header.set_size(0);
            builder
                .append_data(&mut header, &name, io::empty())
                .context(format!("Failed to add directory {} to archive", name))?;
        } else {
            let reader = BufReader::new(
                File::open(path).context(format!("Failed to open {}", path.display()))?,
            );
            append_sized(&mut builder, &mut header, &name, reader)?;
        }
        entries += 1;
    }

    let encoder = builder.into_inner().context("Failed to finish tar stream")?;
    let file = encoder.finish().context("Failed to finish gzip stream")?;
    file.sync_all()
        .context(format!("Failed to flush archive {}", dest.display()))?;

    info!(
        "Wrote {} entries to {} in {:?}",
        entries,
        dest.display(),
        start.elapsed()
    );
    Ok(())
}

/// Appends a file entry holding exactly the size recorded in `header`.
///
/// Files still being written to (the run log) can grow after their metadata
/// was read; anything past the recorded size is left out.
fn append_sized<W: Write, R: Read>(
    builder: &mut Builder<W>,
    header: &mut Header,
    name: &str,
    reader: R,
) -> Result<()> {
    let size = header
        .size()
        .context(format!("Failed to read header size for {}", name))?;
    builder
        .append_data(header, name, reader.take(size))
        .context(format!("Failed to add {} to archive", name))?;
    Ok(())
}

/// Tar entry name with `/` separators regardless of platform
fn entry_name(root_prefix: &str, relative: &Path, is_dir: bool) -> String {
    let mut name = root_prefix.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    if is_dir {
        name.push('/');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn entries(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let file = File::open(archive).unwrap();
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().to_string_lossy().into_owned();
                let mut body = Vec::new();
                e.read_to_end(&mut body).unwrap();
                (name, body)
            })
            .collect()
    }

    #[test]
    fn test_names() {
        assert_eq!(archive_root("nic", 1700000000), "nic-supportpkg-1700000000");
        assert_eq!(archive_file_name("ngf", 42), "ngf-supportpkg-42.tar.gz");
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name("p", Path::new(""), true), "p/");
        assert_eq!(entry_name("p", Path::new("logs/ns/a.txt"), false), "p/logs/ns/a.txt");
        assert_eq!(entry_name("p", Path::new("logs"), true), "p/logs/");
    }

    #[test]
    fn test_write_archive_prefixes_every_entry() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(ws.path().join("resources/default")).unwrap();
        fs::write(ws.path().join("resources/default/pods.json"), b"[]").unwrap();

        let dest = out.path().join("x.tar.gz");
        write_archive(ws.path(), &dest, "nic-supportpkg-1").unwrap();

        let names: Vec<String> = entries(&dest).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "nic-supportpkg-1/",
                "nic-supportpkg-1/resources/",
                "nic-supportpkg-1/resources/default/",
                "nic-supportpkg-1/resources/default/pods.json",
            ]
        );
    }

    #[test]
    fn test_grown_file_is_cut_at_recorded_size() {
        let mut builder = Builder::new(Vec::new());

        let mut header = Header::new_gnu();
        header.set_size(5);
        append_sized(&mut builder, &mut header, "p/supportpkg.log", &b"first late line"[..]).unwrap();

        let mut header = Header::new_gnu();
        header.set_size(2);
        append_sized(&mut builder, &mut header, "p/pods.json", &b"[]"[..]).unwrap();

        let bytes = builder.into_inner().unwrap();
        let mut tar = tar::Archive::new(bytes.as_slice());
        let read: Vec<(String, Vec<u8>)> = tar
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().to_string_lossy().into_owned();
                let mut body = Vec::new();
                e.read_to_end(&mut body).unwrap();
                (name, body)
            })
            .collect();

        assert_eq!(
            read,
            vec![
                ("p/supportpkg.log".to_string(), b"first".to_vec()),
                ("p/pods.json".to_string(), b"[]".to_vec()),
            ]
        );
    }

    #[test]
    fn test_existing_archive_is_not_overwritten() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("taken.tar.gz");
        fs::write(&dest, b"keep me").unwrap();

        assert!(write_archive(ws.path(), &dest, "p").is_err());
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let ws = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(ws.path().join("real.txt"), b"data").unwrap();
        std::os::unix::fs::symlink(ws.path().join("real.txt"), ws.path().join("link.txt")).unwrap();

        let dest = out.path().join("a.tar.gz");
        write_archive(ws.path(), &dest, "p").unwrap();

        let all = entries(&dest);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], ("p/real.txt".to_string(), b"data".to_vec()));
    }
}
