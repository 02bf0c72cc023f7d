//! VEB packaging plumbing: the manifest model and the archive build /
//! unpack / inspect operations behind the `vef-pack` CLI and the host's
//! `INSTALL EXTENSION` path.
//!
//! The package layout is fixed by the host installer: a gzipped tar
//! holding `vef.toml`, the shared library named by the manifest, and a
//! `CHECKSUMS` file with one SHA-256 line per packaged file.

pub mod archive;
pub mod manifest;

pub use archive::{inspect, pack, unpack, verify, PackageEntry, UnpackedExtension};
pub use manifest::{ExtensionManifest, ExtensionMeta, FunctionDecl, CHECKSUM_FILE, MANIFEST_FILE};
