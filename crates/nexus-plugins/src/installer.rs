//! Plugin bundle installation.
//!
//! Accepted sources:
//! - a local directory, copied to `<plugins>/<basename>`
//! - a `.zip` archive, extracted to `<plugins>/<name>`
//! - a `.tar.gz` / `.tgz` archive, extracted to `<plugins>/<name>`
//! - any other file, copied to `<plugins>/<basename>`
//! - an `http(s)://` URL to any of the file kinds above, downloaded first
//!
//! Archive entries are checked before they are written:
//! - absolute paths and `..` components are rejected
//! - symlinks, hardlinks and device nodes in tarballs are rejected

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PluginError, PluginResult};

/// Install a plugin bundle from `source` into `plugins_dir`.
///
/// Returns the installed path.
///
/// # Errors
///
/// Returns an error if the source is blank or unreadable, a download
/// fails, or an archive is malformed or unsafe.
pub fn install(source: &str, plugins_dir: &Path) -> PluginResult<PathBuf> {
    if source.trim().is_empty() {
        return Err(PluginError::InvalidSource("source is required".to_string()));
    }
    if plugins_dir.as_os_str().is_empty() {
        return Err(PluginError::InvalidSource(
            "plugins directory is required".to_string(),
        ));
    }
    std::fs::create_dir_all(plugins_dir)?;

    if source.starts_with("http://") || source.starts_with("https://") {
        let staging = tempfile::tempdir()?;
        let local = download(source, staging.path())?;
        return install_local(&local, plugins_dir);
    }
    install_local(Path::new(source), plugins_dir)
}

fn install_local(path: &Path, plugins_dir: &Path) -> PluginResult<PathBuf> {
    let metadata = std::fs::metadata(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PluginError::InvalidSource(path.display().to_string()))?;

    let target = if metadata.is_dir() {
        let target = plugins_dir.join(&file_name);
        copy_dir(path, &target)?;
        target
    } else {
        match ArchiveKind::detect(&file_name) {
            Some((ArchiveKind::Zip, stem)) => {
                let target = plugins_dir.join(stem);
                extract_zip(path, &target)?;
                target
            },
            Some((ArchiveKind::TarGz, stem)) => {
                let target = plugins_dir.join(stem);
                extract_tar_gz(path, &target)?;
                target
            },
            None => {
                let target = plugins_dir.join(&file_name);
                std::fs::copy(path, &target)?;
                target
            },
        }
    };

    info!(source = %path.display(), target = %target.display(), "installed plugin");
    Ok(target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Archive kind and the file name without its archive extensions.
    fn detect(file_name: &str) -> Option<(Self, &str)> {
        let lower = file_name.to_ascii_lowercase();
        let strip = |suffix: &str| &file_name[..file_name.len().saturating_sub(suffix.len())];
        if lower.ends_with(".tar.gz") {
            Some((Self::TarGz, strip(".tar.gz")))
        } else if lower.ends_with(".tgz") {
            Some((Self::TarGz, strip(".tgz")))
        } else if lower.ends_with(".zip") {
            Some((Self::Zip, strip(".zip")))
        } else {
            None
        }
    }
}

/// Download `url` into `dir`, keeping the URL's file name.
fn download(url: &str, dir: &Path) -> PluginResult<PathBuf> {
    let parsed = url::Url::parse(url)
        .map_err(|e| PluginError::InvalidSource(format!("invalid url {url}: {e}")))?;
    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("plugin");

    debug!(url, "downloading plugin bundle");
    let response = reqwest::blocking::get(parsed.clone()).map_err(|e| PluginError::DownloadFailed {
        message: e.to_string(),
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(PluginError::DownloadFailed {
            message: status.to_string(),
        });
    }
    let bytes = response.bytes().map_err(|e| PluginError::DownloadFailed {
        message: e.to_string(),
    })?;

    let path = dir.join(file_name);
    std::fs::write(&path, &bytes)?;
    Ok(path)
}

fn copy_dir(src: &Path, dst: &Path) -> PluginResult<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| PluginError::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PluginError::InvalidSource(e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> PluginResult<()> {
    let zip_err = |e: zip::result::ZipError| PluginError::ExtractionError {
        message: e.to_string(),
    };
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?).map_err(zip_err)?;
    std::fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(zip_err)?;
        let entry_path = PathBuf::from(file.name());
        validate_entry_path(&entry_path)?;
        let target = dest.join(&entry_path);

        if file.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut file, &mut out)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> PluginResult<()> {
    let mut archive = Archive::new(GzDecoder::new(File::open(archive_path)?));
    std::fs::create_dir_all(dest)?;

    let entries = archive.entries().map_err(|e| PluginError::ExtractionError {
        message: format!("failed to read archive entries: {e}"),
    })?;
    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| PluginError::ExtractionError {
            message: format!("failed to read archive entry: {e}"),
        })?;

        let entry_path = entry
            .path()
            .map_err(|e| PluginError::ExtractionError {
                message: format!("failed to read entry path: {e}"),
            })?
            .into_owned();
        validate_entry_path(&entry_path)?;

        let entry_type = entry.header().entry_type();
        if !is_safe_entry_type(entry_type) {
            return Err(PluginError::UnsafeEntryType {
                entry_type: format!("{entry_type:?}"),
                path: entry_path.display().to_string(),
            });
        }
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }

        let target = dest.join(&entry_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&target)
            .map_err(|e| PluginError::ExtractionError {
                message: format!("failed to unpack {}: {e}", entry_path.display()),
            })?;
    }
    Ok(())
}

fn is_safe_entry_type(entry_type: tar::EntryType) -> bool {
    matches!(
        entry_type,
        tar::EntryType::Regular
            | tar::EntryType::Directory
            | tar::EntryType::GNULongName
            | tar::EntryType::XHeader
            | tar::EntryType::XGlobalHeader
    )
}

/// Reject absolute paths and components that escape the destination.
fn validate_entry_path(path: &Path) -> PluginResult<()> {
    let escapes = path.is_absolute()
        || path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::Prefix(_) | Component::RootDir
            )
        });
    if escapes {
        return Err(PluginError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let mut builder = tar::Builder::new(Vec::new());
        for &(name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        let tar_data = builder.into_inner().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(&tar_data).unwrap();
        std::fs::write(path, encoder.finish().unwrap()).unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for &(name, data) in entries {
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    // ---- Source validation ----

    #[test]
    fn test_blank_source_rejected() {
        let dest = tempfile::tempdir().unwrap();
        assert!(matches!(
            install("  ", dest.path()),
            Err(PluginError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_blank_plugins_dir_rejected() {
        assert!(matches!(
            install("bundle.zip", Path::new("")),
            Err(PluginError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dest = tempfile::tempdir().unwrap();
        assert!(matches!(
            install("/nonexistent/bundle.zip", dest.path()),
            Err(PluginError::Io(_))
        ));
    }

    // ---- Local kinds ----

    #[test]
    fn test_install_directory() {
        let src_root = tempfile::tempdir().unwrap();
        let src = src_root.path().join("disk-report");
        std::fs::create_dir_all(src.join("bin")).unwrap();
        std::fs::write(src.join("nexus.yaml"), "metadata:\n  name: disk-report\n").unwrap();
        std::fs::write(src.join("bin/run.sh"), "#!/bin/sh\n").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let installed = install(src.to_str().unwrap(), &dest.path().join("plugins")).unwrap();

        assert_eq!(installed, dest.path().join("plugins/disk-report"));
        assert!(installed.join("nexus.yaml").is_file());
        assert!(installed.join("bin/run.sh").is_file());
    }

    #[test]
    fn test_install_tar_gz() {
        let src_root = tempfile::tempdir().unwrap();
        let archive = src_root.path().join("disk-report.tar.gz");
        write_tar_gz(
            &archive,
            &[("nexus.yaml", b"kind: Plugin\n"), ("bin/run.sh", b"#!/bin/sh\n")],
        );

        let dest = tempfile::tempdir().unwrap();
        let installed = install(archive.to_str().unwrap(), dest.path()).unwrap();
        assert_eq!(installed, dest.path().join("disk-report"));
        assert_eq!(
            std::fs::read_to_string(installed.join("nexus.yaml")).unwrap(),
            "kind: Plugin\n"
        );
        assert!(installed.join("bin/run.sh").is_file());
    }

    #[test]
    fn test_install_tgz() {
        let src_root = tempfile::tempdir().unwrap();
        let archive = src_root.path().join("probe.tgz");
        write_tar_gz(&archive, &[("nexus.yaml", b"{}\n")]);

        let dest = tempfile::tempdir().unwrap();
        let installed = install(archive.to_str().unwrap(), dest.path()).unwrap();
        assert_eq!(installed, dest.path().join("probe"));
    }

    #[test]
    fn test_install_zip() {
        let src_root = tempfile::tempdir().unwrap();
        let archive = src_root.path().join("probe.zip");
        write_zip(&archive, &[("nexus.yaml", b"{}\n"), ("scripts/go.sh", b"echo\n")]);

        let dest = tempfile::tempdir().unwrap();
        let installed = install(archive.to_str().unwrap(), dest.path()).unwrap();
        assert_eq!(installed, dest.path().join("probe"));
        assert!(installed.join("nexus.yaml").is_file());
        assert!(installed.join("scripts/go.sh").is_file());
    }

    #[test]
    fn test_install_plain_file() {
        let src_root = tempfile::tempdir().unwrap();
        let file = src_root.path().join("notes.txt");
        std::fs::write(&file, "hello").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let installed = install(file.to_str().unwrap(), dest.path()).unwrap();
        assert_eq!(installed, dest.path().join("notes.txt"));
        assert_eq!(std::fs::read_to_string(installed).unwrap(), "hello");
    }

    // ---- Unsafe archives ----

    #[test]
    fn test_zip_traversal_rejected() {
        let src_root = tempfile::tempdir().unwrap();
        let archive = src_root.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", b"x")]);

        let dest = tempfile::tempdir().unwrap();
        let err = install(archive.to_str().unwrap(), dest.path()).unwrap_err();
        assert!(matches!(err, PluginError::PathTraversal { .. }));
        assert!(!dest.path().join("escape.txt").exists());
    }

    #[test]
    fn test_validate_entry_path() {
        assert!(validate_entry_path(Path::new("a/b.txt")).is_ok());
        assert!(validate_entry_path(Path::new("./a")).is_ok());
        assert!(validate_entry_path(Path::new("../a")).is_err());
        assert!(validate_entry_path(Path::new("a/../../b")).is_err());
        assert!(validate_entry_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_archive_kind_detect() {
        assert_eq!(
            ArchiveKind::detect("x.tar.gz"),
            Some((ArchiveKind::TarGz, "x"))
        );
        assert_eq!(ArchiveKind::detect("X.TGZ"), Some((ArchiveKind::TarGz, "X")));
        assert_eq!(ArchiveKind::detect("x.zip"), Some((ArchiveKind::Zip, "x")));
        assert_eq!(ArchiveKind::detect("x.gz"), None);
        assert_eq!(ArchiveKind::detect("x.yaml"), None);
    }
}
