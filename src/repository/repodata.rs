// src/repository/repodata.rs

//! rpm-md repository metadata source
//!
//! Reads `repodata/repomd.xml` to locate `primary.xml`, then parses the
//! package list with its dependency entries. Repositories are addressed by
//! a local directory or an `http(s)://` base URL.

use super::MetadataSource;
use crate::error::{Error, Result};
use crate::units::{RawUnit, UnitKind};
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::blocking::Client;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// rpm-md (`repodata/`) metadata source
pub struct RepodataSource {
    client: Option<Client>,
    max_retries: u32,
}

impl RepodataSource {
    /// Create a source that can read local directories and remote URLs
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Some(client),
            max_retries: MAX_RETRIES,
        })
    }

    /// Create a source restricted to local directories
    pub fn local() -> Self {
        Self {
            client: None,
            max_retries: MAX_RETRIES,
        }
    }

    /// Read a file relative to the repository root
    fn read(&self, repository: &str, relative: &str) -> Result<Vec<u8>> {
        if is_remote(repository) {
            let url = format!("{}/{}", repository.trim_end_matches('/'), relative);
            return self.download(&url);
        }

        let path = Path::new(repository).join(relative);
        debug!("Reading {}", path.display());
        Ok(std::fs::read(&path)?)
    }

    /// Download a URL with retry support
    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let client = self.client.as_ref().ok_or_else(|| {
            Error::DownloadError(format!("Remote repositories are disabled: {}", url))
        })?;

        debug!("Downloading {}", url);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    let bytes = response.bytes().map_err(|e| {
                        Error::DownloadError(format!("Failed to read response: {}", e))
                    })?;
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl MetadataSource for RepodataSource {
    fn list_units(&self, repository: &str) -> Result<Vec<RawUnit>> {
        info!("Loading repository metadata from {}", repository);

        let repomd = self.read(repository, "repodata/repomd.xml")?;
        let repomd = String::from_utf8(repomd)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in repomd.xml: {}", e)))?;
        let location = primary_location(&repomd)?;

        let compressed = self.read(repository, &location)?;
        let primary = decompress(&location, &compressed)?;
        let units = parse_primary_xml(&primary)?;

        info!("Parsed {} units from {}", units.len(), repository);
        Ok(units)
    }
}

fn is_remote(repository: &str) -> bool {
    repository.starts_with("http://") || repository.starts_with("https://")
}

/// Decompress primary.xml according to its file extension
fn decompress(location: &str, bytes: &[u8]) -> Result<String> {
    let raw = if location.ends_with(".gz") {
        debug!("Decompressing gzip-compressed primary.xml");
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?;
        out
    } else if location.ends_with(".zst") {
        debug!("Decompressing zstd-compressed primary.xml");
        zstd::decode_all(bytes)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?
    } else if location.ends_with(".xz") {
        debug!("Decompressing xz-compressed primary.xml");
        let mut out = Vec::new();
        xz2::read::XzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", location, e)))?;
        out
    } else {
        bytes.to_vec()
    };

    String::from_utf8(raw).map_err(|e| Error::ParseError(format!("Invalid UTF-8 in primary.xml: {}", e)))
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Find the location of the primary metadata in repomd.xml
pub fn primary_location(repomd: &str) -> Result<String> {
    let mut reader = Reader::from_str(repomd);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_primary = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"data" => {
                in_primary = attribute(&e, b"type").as_deref() == Some("primary");
            }
            Ok(Event::Start(e) | Event::Empty(e))
                if in_primary && e.local_name().as_ref() == b"location" =>
            {
                if let Some(href) = attribute(&e, b"href") {
                    return Ok(href);
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"data" => {
                in_primary = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "Failed to parse repomd.xml: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Err(Error::ParseError(
        "Could not find primary data location in repomd.xml".to_string(),
    ))
}

/// Dependency list currently being read inside `<format>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Provides,
    Requires,
    Recommends,
    Suggests,
    Supplements,
    Enhances,
    Obsoletes,
    Conflicts,
}

impl Section {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"provides" => Some(Section::Provides),
            b"requires" => Some(Section::Requires),
            b"recommends" => Some(Section::Recommends),
            b"suggests" => Some(Section::Suggests),
            b"supplements" => Some(Section::Supplements),
            b"enhances" => Some(Section::Enhances),
            b"obsoletes" => Some(Section::Obsoletes),
            b"conflicts" => Some(Section::Conflicts),
            _ => None,
        }
    }
}

/// Render an `<rpm:entry>` as a dependency string (`name OP evr`)
fn entry_to_string(e: &BytesStart<'_>) -> Option<String> {
    let name = attribute(e, b"name")?;
    let flags = attribute(e, b"flags");
    let ver = attribute(e, b"ver");

    let (Some(flags), Some(ver)) = (flags, ver) else {
        return Some(name);
    };

    let op = match flags.as_str() {
        "LT" => "<",
        "LE" => "<=",
        "EQ" => "=",
        "GE" => ">=",
        "GT" => ">",
        _ => return Some(name),
    };

    let mut evr = String::new();
    if let Some(epoch) = attribute(e, b"epoch").filter(|ep| !ep.is_empty() && ep != "0") {
        evr.push_str(&epoch);
        evr.push(':');
    }
    evr.push_str(&ver);
    if let Some(rel) = attribute(e, b"rel").filter(|r| !r.is_empty()) {
        evr.push('-');
        evr.push_str(&rel);
    }

    Some(format!("{} {} {}", name, op, evr))
}

/// Parse primary.xml into raw unit descriptors
pub fn parse_primary_xml(xml: &str) -> Result<Vec<RawUnit>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut units = Vec::new();
    let mut buf = Vec::new();

    let mut current: Option<RawUnit> = None;
    let mut current_tag = Vec::new();
    let mut checksum_is_sha256 = false;
    let mut in_format = false;
    let mut section: Option<Section> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = e.local_name().as_ref().to_vec();
                match tag.as_slice() {
                    b"package" => {
                        current = match attribute(&e, b"type").as_deref() {
                            Some("rpm") | None => Some(RawUnit::default()),
                            Some(other) => {
                                debug!("Skipping package of type {}", other);
                                None
                            }
                        };
                    }
                    b"format" => in_format = true,
                    b"checksum" => {
                        checksum_is_sha256 = attribute(&e, b"type").as_deref() == Some("sha256");
                    }
                    other if in_format => {
                        if let Some(s) = Section::from_tag(other) {
                            section = Some(s);
                        }
                    }
                    _ => {}
                }
                current_tag = tag;
            }
            Ok(Event::Empty(e)) => {
                if let Some(unit) = current.as_mut() {
                    match e.local_name().as_ref() {
                        b"version" if !in_format => {
                            unit.epoch = attribute(&e, b"epoch");
                            unit.version = attribute(&e, b"ver").unwrap_or_default();
                            unit.release = attribute(&e, b"rel");
                        }
                        b"location" if !in_format => {
                            unit.location = attribute(&e, b"href");
                        }
                        b"entry" => {
                            if let Some(dep) = entry_to_string(&e) {
                                match section {
                                    Some(Section::Provides) => unit.provides.push(dep),
                                    Some(Section::Requires) => unit.requires.push(dep),
                                    Some(Section::Recommends) => unit.recommends.push(dep),
                                    Some(Section::Suggests) => unit.suggests.push(dep),
                                    Some(Section::Supplements) => unit.supplements.push(dep),
                                    Some(Section::Enhances) => unit.enhances.push(dep),
                                    Some(Section::Obsoletes) => unit.obsoletes.push(dep),
                                    Some(Section::Conflicts) => unit.conflicts.push(dep),
                                    None => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(unit) = current.as_mut() {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match current_tag.as_slice() {
                        b"name" if !in_format => unit.name = text,
                        b"arch" if !in_format => {
                            if text == "src" || text == "nosrc" {
                                unit.kind = UnitKind::Srpm;
                            }
                            unit.arch = Some(text);
                        }
                        b"checksum" if checksum_is_sha256 => unit.checksum = Some(text),
                        // Files double as provides so path requirements resolve
                        b"file" if in_format => unit.provides.push(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"package" => {
                        if let Some(unit) = current.take() {
                            if unit.name.is_empty() || unit.version.is_empty() {
                                warn!("Skipping package entry without name or version");
                            } else {
                                units.push(unit);
                            }
                        }
                    }
                    b"format" => in_format = false,
                    tag if Section::from_tag(tag).is_some() => section = None,
                    _ => {}
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!("Failed to parse primary.xml: {}", e)))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const REPOMD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>1</revision>
  <data type="filelists">
    <location href="repodata/filelists.xml.gz"/>
  </data>
  <data type="primary">
    <checksum type="sha256">abc</checksum>
    <location href="repodata/primary.xml.gz"/>
  </data>
</repomd>"#;

    pub(crate) const PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="3">
<package type="rpm">
  <name>penguin</name>
  <arch>x86_64</arch>
  <version epoch="0" ver="1.0" rel="1.fc40"/>
  <checksum type="sha256" pkgid="YES">feedface</checksum>
  <summary>A penguin</summary>
  <location href="Packages/p/penguin-1.0-1.fc40.x86_64.rpm"/>
  <format>
    <rpm:license>MIT</rpm:license>
    <rpm:provides>
      <rpm:entry name="penguin" flags="EQ" epoch="0" ver="1.0" rel="1.fc40"/>
      <rpm:entry name="penguin(x86-64)" flags="EQ" epoch="0" ver="1.0" rel="1.fc40"/>
    </rpm:provides>
    <rpm:requires>
      <rpm:entry name="rpmlib(CompressedFileNames)" flags="LE" epoch="0" ver="3.0.4" rel="1" pre="1"/>
      <rpm:entry name="zoo-lib" flags="GE" epoch="0" ver="2.0"/>
      <rpm:entry name="/usr/bin/fish"/>
    </rpm:requires>
    <rpm:recommends>
      <rpm:entry name="ice"/>
    </rpm:recommends>
    <rpm:suggests>
      <rpm:entry name="snow"/>
    </rpm:suggests>
    <rpm:supplements>
      <rpm:entry name="(zoo-lib and font(:lang=en))"/>
    </rpm:supplements>
    <rpm:enhances>
      <rpm:entry name="walrus" flags="GE" epoch="0" ver="3"/>
    </rpm:enhances>
    <rpm:obsoletes>
      <rpm:entry name="old-penguin" flags="LT" epoch="1" ver="0.9"/>
    </rpm:obsoletes>
    <file>/usr/bin/penguin</file>
  </format>
</package>
<package type="rpm">
  <name>zoo-lib</name>
  <arch>noarch</arch>
  <version epoch="2" ver="2.1" rel="3"/>
  <location href="Packages/z/zoo-lib-2.1-3.noarch.rpm"/>
  <format>
    <rpm:provides>
      <rpm:entry name="zoo-lib" flags="EQ" epoch="2" ver="2.1" rel="3"/>
      <rpm:entry name="font(:lang=en)"/>
    </rpm:provides>
    <rpm:conflicts>
      <rpm:entry name="walrus"/>
    </rpm:conflicts>
  </format>
</package>
<package type="rpm">
  <name>penguin</name>
  <arch>src</arch>
  <version epoch="0" ver="1.0" rel="1.fc40"/>
  <location href="Packages/p/penguin-1.0-1.fc40.src.rpm"/>
  <format/>
</package>
</metadata>"#;

    #[test]
    fn test_primary_location() {
        assert_eq!(primary_location(REPOMD).unwrap(), "repodata/primary.xml.gz");
    }

    #[test]
    fn test_primary_location_missing() {
        let repomd = r#"<repomd><data type="other"><location href="x"/></data></repomd>"#;
        assert!(primary_location(repomd).is_err());
    }

    #[test]
    fn test_parse_primary_xml() {
        let units = parse_primary_xml(PRIMARY).unwrap();
        assert_eq!(units.len(), 3);

        let penguin = &units[0];
        assert_eq!(penguin.name, "penguin");
        assert_eq!(penguin.kind, UnitKind::Rpm);
        assert_eq!(penguin.arch.as_deref(), Some("x86_64"));
        assert_eq!(penguin.epoch.as_deref(), Some("0"));
        assert_eq!(penguin.version, "1.0");
        assert_eq!(penguin.release.as_deref(), Some("1.fc40"));
        assert_eq!(penguin.checksum.as_deref(), Some("feedface"));
        assert_eq!(
            penguin.location.as_deref(),
            Some("Packages/p/penguin-1.0-1.fc40.x86_64.rpm")
        );
        assert_eq!(
            penguin.provides,
            vec![
                "penguin = 1.0-1.fc40",
                "penguin(x86-64) = 1.0-1.fc40",
                "/usr/bin/penguin"
            ]
        );
        assert_eq!(
            penguin.requires,
            vec![
                "rpmlib(CompressedFileNames) <= 3.0.4-1",
                "zoo-lib >= 2.0",
                "/usr/bin/fish"
            ]
        );
        assert_eq!(penguin.recommends, vec!["ice"]);
        assert_eq!(penguin.suggests, vec!["snow"]);
        assert_eq!(penguin.supplements, vec!["(zoo-lib and font(:lang=en))"]);
        assert_eq!(penguin.enhances, vec!["walrus >= 3"]);
        assert_eq!(penguin.obsoletes, vec!["old-penguin < 1:0.9"]);

        let zoo_lib = &units[1];
        assert_eq!(zoo_lib.provides, vec!["zoo-lib = 2:2.1-3", "font(:lang=en)"]);
        assert_eq!(zoo_lib.conflicts, vec!["walrus"]);
        assert!(zoo_lib.requires.is_empty());
        assert!(zoo_lib.checksum.is_none());

        assert_eq!(units[2].kind, UnitKind::Srpm);
    }

    #[test]
    fn test_parenthesized_names_normalize() {
        let normalized = crate::units::normalize(parse_primary_xml(PRIMARY).unwrap());
        assert!(normalized.warnings.is_empty());

        let zoo_lib = &normalized.units[1];
        assert_eq!(
            zoo_lib.provides[1],
            crate::units::Capability::unversioned("font(:lang=en)")
        );
        assert_eq!(
            normalized.units[0].supplements[0].to_string(),
            "(zoo-lib and font(:lang=en))"
        );
    }

    #[test]
    fn test_parse_primary_xml_invalid() {
        assert!(parse_primary_xml("<metadata><package></metadata>").is_err());
    }

    #[test]
    fn test_list_units_local_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let repodata = dir.path().join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();
        std::fs::write(repodata.join("repomd.xml"), REPOMD).unwrap();

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(PRIMARY.as_bytes()).unwrap();
        std::fs::write(repodata.join("primary.xml.gz"), encoder.finish().unwrap()).unwrap();

        let units = RepodataSource::local()
            .list_units(dir.path().to_str().unwrap())
            .unwrap();
        assert_eq!(units.len(), 3);
    }

    #[test]
    fn test_list_units_missing_repository() {
        let result = RepodataSource::local().list_units("/nonexistent/repo");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_remote_disabled_for_local_source() {
        let result = RepodataSource::local().list_units("https://example.com/repo");
        assert!(matches!(result, Err(Error::DownloadError(_))));
    }

    #[test]
    fn test_decompress_plain() {
        assert_eq!(decompress("primary.xml", b"<x/>").unwrap(), "<x/>");
    }
}
