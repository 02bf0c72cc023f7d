use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::manifest::{ExtensionManifest, CHECKSUM_FILE, MANIFEST_FILE};

// 解包保护上限：一个 VEB 正常只有三个条目
const MAX_ENTRY_COUNT: usize = 64;
const MAX_EXTRACTED_SIZE: u64 = 256 * 1024 * 1024;

/// An extracted package on disk.
#[derive(Debug)]
pub struct UnpackedExtension {
    pub manifest: ExtensionManifest,
    pub root: PathBuf,
    pub library_path: PathBuf,
}

/// One entry of a package listing.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub size: u64,
}

/// 打包：清单 + 共享库 + 校验和 -> .veb
pub fn pack(manifest_path: &Path, library_path: &Path, out_path: &Path) -> Result<ExtensionManifest> {
    let manifest_raw = std::fs::read(manifest_path)
        .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
    let manifest = ExtensionManifest::parse(std::str::from_utf8(&manifest_raw)?)
        .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;

    let library_raw = std::fs::read(library_path)
        .with_context(|| format!("failed to read library {}", library_path.display()))?;

    if let Some(file_name) = library_path.file_name().and_then(|n| n.to_str()) {
        if file_name != manifest.extension.library {
            tracing::warn!(
                "library file {} packaged under manifest name {}",
                file_name,
                manifest.extension.library
            );
        }
    }

    let checksums = format!(
        "{}  {}\n{}  {}\n",
        sha256_hex(&manifest_raw),
        MANIFEST_FILE,
        sha256_hex(&library_raw),
        manifest.extension.library
    );

    let out = std::fs::File::create(out_path)
        .with_context(|| format!("failed to create package {}", out_path.display()))?;
    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_entry(&mut builder, MANIFEST_FILE, &manifest_raw)?;
    append_entry(&mut builder, &manifest.extension.library, &library_raw)?;
    append_entry(&mut builder, CHECKSUM_FILE, checksums.as_bytes())?;

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .context("failed to finish package archive")?;

    tracing::info!(
        "packaged extension {} v{} -> {}",
        manifest.extension.name,
        manifest.extension.version,
        out_path.display()
    );
    Ok(manifest)
}

fn append_entry<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, name, bytes)
        .with_context(|| format!("failed to append {name}"))
}

/// 解包一个 .veb 到 dest，并验证清单和校验和
pub fn unpack(package: &Path, dest: &Path) -> Result<UnpackedExtension> {
    let file = std::fs::File::open(package)
        .with_context(|| format!("failed to open package {}", package.display()))?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    // 不保留归档里的权限位，防止恶意包恢复 setuid/setgid
    archive.set_preserve_permissions(false);

    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;

    let mut entry_count = 0usize;
    let mut total_size: u64 = 0;

    for entry_result in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry_result.context("failed to read archive entry")?;

        entry_count += 1;
        if entry_count > MAX_ENTRY_COUNT {
            bail!("package has more than {MAX_ENTRY_COUNT} entries");
        }

        let entry_type = entry.header().entry_type();
        if !matches!(entry_type, tar::EntryType::Regular | tar::EntryType::Directory) {
            bail!("unsafe entry type {entry_type:?} in package");
        }

        total_size = total_size.saturating_add(entry.header().size()?);
        if total_size > MAX_EXTRACTED_SIZE {
            bail!("package exceeds maximum extracted size ({MAX_EXTRACTED_SIZE} bytes)");
        }

        let path = entry
            .path()
            .context("entry has an unreadable path")?
            .into_owned();
        if path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        }) {
            bail!("entry path escapes the package root: {}", path.display());
        }

        if !entry
            .unpack_in(dest)
            .with_context(|| format!("failed to extract {}", path.display()))?
        {
            bail!("entry refused extraction outside {}", dest.display());
        }
    }

    let manifest = ExtensionManifest::load(&dest.join(MANIFEST_FILE))
        .context("package is missing a valid vef.toml")?;

    verify_checksums(dest, &manifest)?;

    let library_path = dest.join(&manifest.extension.library);
    if !library_path.is_file() {
        bail!(
            "package is missing its library {}",
            manifest.extension.library
        );
    }

    tracing::debug!(
        "unpacked extension {} into {}",
        manifest.extension.name,
        dest.display()
    );
    Ok(UnpackedExtension {
        manifest,
        root: dest.to_path_buf(),
        library_path,
    })
}

/// 逐行核对 CHECKSUMS，清单与库文件必须在列
fn verify_checksums(root: &Path, manifest: &ExtensionManifest) -> Result<()> {
    let raw = std::fs::read_to_string(root.join(CHECKSUM_FILE))
        .context("package is missing its CHECKSUMS file")?;

    let mut covered = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let (expected, name) = line
            .split_once("  ")
            .ok_or_else(|| anyhow!("malformed checksum line: {line}"))?;
        if name.contains('/') || name.contains('\\') {
            bail!("checksum entry must be a bare file name: {name}");
        }

        let bytes = std::fs::read(root.join(name))
            .with_context(|| format!("checksum names a missing file: {name}"))?;
        let actual = sha256_hex(&bytes);
        if actual != expected {
            bail!("checksum mismatch for {name}");
        }
        covered.push(name.to_string());
    }

    for required in [MANIFEST_FILE, manifest.extension.library.as_str()] {
        if !covered.iter().any(|name| name == required) {
            bail!("CHECKSUMS does not cover {required}");
        }
    }
    Ok(())
}

/// 不解包，列出包内容并读出清单
pub fn inspect(package: &Path) -> Result<(ExtensionManifest, Vec<PackageEntry>)> {
    let file = std::fs::File::open(package)
        .with_context(|| format!("failed to open package {}", package.display()))?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    let mut entries = Vec::new();
    let mut manifest_raw: Option<String> = None;

    for entry_result in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry_result.context("failed to read archive entry")?;
        let name = entry.path()?.display().to_string();
        let size = entry.header().size()?;

        if name == MANIFEST_FILE {
            let mut raw = String::new();
            entry.read_to_string(&mut raw)?;
            manifest_raw = Some(raw);
        }
        entries.push(PackageEntry { name, size });
    }

    let manifest_raw = manifest_raw
        .ok_or_else(|| anyhow!("package does not contain {MANIFEST_FILE}"))?;
    let manifest = ExtensionManifest::parse(&manifest_raw)?;
    Ok((manifest, entries))
}

/// 在临时目录里完整解包一次，校验通过即认为包是好的
pub fn verify(package: &Path) -> Result<ExtensionManifest> {
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let unpacked = unpack(package, scratch.path())?;
    Ok(unpacked.manifest)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
