use num::FromPrimitive;

use super::headers::*;
use super::signature;
use crate::constants::*;
use crate::errors::*;

/// Metadata of one installed package, decoded from a single header
/// blob.
///
/// String fields of packages that never set the corresponding tag are
/// empty rather than absent; `epoch` keeps its absence observable since
/// an explicit epoch of zero is meaningful to version comparison.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: Option<u32>,
    pub arch: String,
    pub summary: String,
    pub description: String,
    pub license: String,
    pub vendor: String,
    pub url: String,
    pub group: String,
    pub source_rpm: String,
    pub modularity_label: String,
    pub platform: String,
    pub size: u32,
    pub build_time: u64,
    pub install_time: u64,
    /// MD5 of the package this header was installed from, lowercase hex.
    pub sig_md5: String,
    /// Textual signature summary, empty when the package is unsigned or
    /// the signature packet is unparseable.
    pub pgp: String,
    pub digest_algorithm: DigestAlgorithm,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    pub base_names: Vec<String>,
    pub dir_indexes: Vec<u32>,
    pub dir_names: Vec<String>,
    pub file_sizes: Vec<i32>,
    pub file_digests: Vec<String>,
    pub file_modes: Vec<u16>,
    pub file_flags: Vec<i32>,
    pub user_names: Vec<String>,
    pub group_names: Vec<String>,
}

/// One file recorded in a package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub mode: u16,
    pub digest: String,
    pub size: i32,
    pub username: String,
    pub groupname: String,
    pub flags: i32,
}

impl FileInfo {
    /// Interpretation of the raw flag word (`%config`, `%doc`, ...).
    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits_truncate(self.flags as u32)
    }
}

impl PackageInfo {
    /// Decode one database blob into a package record.
    pub(crate) fn from_blob(blob: &[u8]) -> Result<PackageInfo, Error> {
        let header = Header::parse(blob)?;
        Self::from_header(&header)
    }

    fn from_header(header: &Header) -> Result<PackageInfo, Error> {
        let owned = |value: Option<&str>| value.unwrap_or_default().to_string();
        let list = |value: Option<&[String]>| value.unwrap_or_default().to_vec();

        let digest_algorithm = header
            .get_u32(IndexTag::RPMTAG_FILEDIGESTALGO)?
            .and_then(DigestAlgorithm::from_u32)
            .unwrap_or_default();
        let pgp = header
            .get_binary(IndexTag::RPMTAG_RSAHEADER)?
            .and_then(signature::summarize)
            .unwrap_or_default();
        let sig_md5 = header
            .get_binary(IndexTag::RPMTAG_SIGMD5)?
            .map(hex::encode)
            .unwrap_or_default();

        Ok(PackageInfo {
            name: owned(header.get_string(IndexTag::RPMTAG_NAME)?),
            version: owned(header.get_string(IndexTag::RPMTAG_VERSION)?),
            release: owned(header.get_string(IndexTag::RPMTAG_RELEASE)?),
            epoch: header.get_u32(IndexTag::RPMTAG_EPOCH)?,
            arch: owned(header.get_string(IndexTag::RPMTAG_ARCH)?),
            summary: owned(header.get_i18n_string(IndexTag::RPMTAG_SUMMARY)?),
            description: owned(header.get_i18n_string(IndexTag::RPMTAG_DESCRIPTION)?),
            license: owned(header.get_string(IndexTag::RPMTAG_LICENSE)?),
            vendor: owned(header.get_string(IndexTag::RPMTAG_VENDOR)?),
            url: owned(header.get_string(IndexTag::RPMTAG_URL)?),
            group: owned(header.get_i18n_string(IndexTag::RPMTAG_GROUP)?),
            source_rpm: owned(header.get_string(IndexTag::RPMTAG_SOURCERPM)?),
            modularity_label: owned(header.get_string(IndexTag::RPMTAG_MODULARITYLABEL)?),
            platform: owned(header.get_string(IndexTag::RPMTAG_PLATFORM)?),
            size: header.get_u32(IndexTag::RPMTAG_SIZE)?.unwrap_or_default(),
            build_time: header
                .get_u32(IndexTag::RPMTAG_BUILDTIME)?
                .unwrap_or_default()
                .into(),
            install_time: header
                .get_u32(IndexTag::RPMTAG_INSTALLTIME)?
                .unwrap_or_default()
                .into(),
            sig_md5,
            pgp,
            digest_algorithm,
            provides: list(header.get_string_array(IndexTag::RPMTAG_PROVIDENAME)?),
            requires: list(header.get_string_array(IndexTag::RPMTAG_REQUIRENAME)?),
            base_names: list(header.get_string_array(IndexTag::RPMTAG_BASENAMES)?),
            dir_indexes: header
                .get_u32_array(IndexTag::RPMTAG_DIRINDEXES)?
                .unwrap_or_default(),
            dir_names: list(header.get_string_array(IndexTag::RPMTAG_DIRNAMES)?),
            file_sizes: header
                .get_u32_array(IndexTag::RPMTAG_FILESIZES)?
                .unwrap_or_default()
                .into_iter()
                .map(|size| size as i32)
                .collect(),
            file_digests: list(header.get_string_array(IndexTag::RPMTAG_FILEDIGESTS)?),
            file_modes: header
                .get_u16_array(IndexTag::RPMTAG_FILEMODES)?
                .unwrap_or_default(),
            file_flags: header
                .get_u32_array(IndexTag::RPMTAG_FILEFLAGS)?
                .unwrap_or_default()
                .into_iter()
                .map(|flags| flags as i32)
                .collect(),
            user_names: list(header.get_string_array(IndexTag::RPMTAG_FILEUSERNAME)?),
            group_names: list(header.get_string_array(IndexTag::RPMTAG_FILEGROUPNAME)?),
        })
    }

    /// Join the parallel file arrays into one record per installed
    /// file.
    ///
    /// Packages without a file manifest yield an empty vec. Arrays of
    /// mismatched length, or a directory index outside `dir_names`,
    /// mean the header lied about its own manifest and surface as
    /// [`Error::MalformedFiles`].
    pub fn installed_files(&self) -> Result<Vec<FileInfo>, Error> {
        if self.base_names.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.base_names.len();

        if self.dir_indexes.len() != total {
            return Err(Error::MalformedFiles(format!(
                "{} base name(s) but {} directory index(es)",
                total,
                self.dir_indexes.len()
            )));
        }
        for (name, len) in [
            ("file sizes", self.file_sizes.len()),
            ("file digests", self.file_digests.len()),
            ("file modes", self.file_modes.len()),
            ("file flags", self.file_flags.len()),
            ("user names", self.user_names.len()),
            ("group names", self.group_names.len()),
        ] {
            if len != 0 && len != total {
                return Err(Error::MalformedFiles(format!(
                    "{total} base name(s) but {len} {name}"
                )));
            }
        }

        let mut files = Vec::with_capacity(total);
        for (i, base_name) in self.base_names.iter().enumerate() {
            let dir_index = self.dir_indexes[i] as usize;
            let dir_name = self.dir_names.get(dir_index).ok_or_else(|| {
                Error::MalformedFiles(format!(
                    "directory index {dir_index} out of range for {} director(ies)",
                    self.dir_names.len()
                ))
            })?;
            files.push(FileInfo {
                path: format!("{dir_name}{base_name}"),
                mode: self.file_modes.get(i).copied().unwrap_or_default(),
                digest: self.file_digests.get(i).cloned().unwrap_or_default(),
                size: self.file_sizes.get(i).copied().unwrap_or_default(),
                username: self.user_names.get(i).cloned().unwrap_or_default(),
                groupname: self.group_names.get(i).cloned().unwrap_or_default(),
                flags: self.file_flags.get(i).copied().unwrap_or_default(),
            });
        }
        Ok(files)
    }

    /// The `path` projection of [`installed_files`](Self::installed_files).
    pub fn installed_file_names(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .installed_files()?
            .into_iter()
            .map(|file| file.path)
            .collect())
    }
}
