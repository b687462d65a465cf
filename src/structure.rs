//! # Structure Module
//!
//! Resolves unit identity (MAC, serial number, string position) from the
//! site's `structure_<block>.xml` description.
//!
//! ## Document shape
//!
//! ```xml
//! <Site>
//!   <String name="02.01.01-1">
//!     <Converter mac="04880000007B" sn="0117A000123"/>
//!   </String>
//! </Site>
//! ```
//!
//! `String` and `Converter` elements are collected independently, in document
//! order; the n-th converter and the n-th string label describe unit n.
//! Uncommissioned converters carry no `mac` attribute; theirs is rebuilt from
//! the serial number with [`serial_to_mac`].

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, ScanError};

/// Placeholder for identity fields the structure file does not provide
pub const UNKNOWN: &str = "unknown";

/// Identity of one monitored unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitIdentity {
    /// 1-based position in the telemetry table
    pub position: usize,
    pub mac: String,
    pub serial: String,
    /// String-position label, e.g. `02.01.01-1`
    pub location: String,
}

impl UnitIdentity {
    /// Identity used when the structure file lists fewer units than the table
    pub fn unknown(position: usize) -> Self {
        Self {
            position,
            mac: UNKNOWN.to_string(),
            serial: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
        }
    }
}

/// Converter and string records from a structure file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub macs: Vec<String>,
    pub serials: Vec<String>,
    pub locations: Vec<String>,
}

/// Extract the block identifier from a telemetry file name
///
/// The block runs from the `b` of the first `_b` marker up to the first `.`
/// after it, so `log_b302.csv` yields `b302` and `x_b301_2.csv` yields
/// `b301_2`. Dots before the marker are skipped: `v1.2_b7.csv` yields `b7`
/// rather than an empty block.
///
/// # Errors
///
/// Returns [`ScanError::BlockNotFound`] if the name has no `_b` marker or no
/// extension after it.
pub fn block_id(file_name: &str) -> Result<&str> {
    let start = file_name
        .find("_b")
        .map(|idx| idx + 1)
        .ok_or_else(|| ScanError::BlockNotFound(file_name.to_string()))?;
    let end = file_name[start..]
        .find('.')
        .map(|idx| start + idx)
        .ok_or_else(|| ScanError::BlockNotFound(file_name.to_string()))?;
    Ok(&file_name[start..end])
}

/// File name of the structure description for `block`
pub fn structure_file_name(block: &str) -> String {
    format!("structure_{}.xml", block)
}

/// Pack a serial number into a 12-digit hex MAC
///
/// Serial layout is `WWYYL` followed by a decimal sequence number: week,
/// two-digit year, and a production letter. The MAC is
/// `%06X((week << 18) | (year << 11) | (letter << 6))` followed by
/// `%06X(sequence)`.
///
/// # Errors
///
/// Returns [`ScanError::InvalidSerial`] if any part fails to parse.
///
/// # Examples
///
/// ```
/// use fleet_fault_scan::structure::serial_to_mac;
///
/// assert_eq!(serial_to_mac("0117A000123")?, "04880000007B");
/// # Ok::<(), fleet_fault_scan::error::ScanError>(())
/// ```
pub fn serial_to_mac(serial: &str) -> Result<String> {
    let serial = serial.trim().to_ascii_uppercase();
    let invalid = || ScanError::InvalidSerial(serial.clone());

    if !serial.is_ascii() || serial.len() < 6 {
        return Err(invalid());
    }

    let week: u32 = serial[0..2].parse().map_err(|_| invalid())?;
    let year: u32 = serial[2..4].parse().map_err(|_| invalid())?;
    let letter = serial.as_bytes()[4];
    if !letter.is_ascii_uppercase() {
        return Err(invalid());
    }
    let letter = u32::from(letter - b'A');
    let sequence: u32 = serial[5..].parse().map_err(|_| invalid())?;

    Ok(format!(
        "{:06X}{:06X}",
        (week << 18) | (year << 11) | (letter << 6),
        sequence
    ))
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes().with_checks(false) {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

impl Structure {
    /// Parse a structure document
    ///
    /// # Errors
    ///
    /// Returns error if the XML is malformed.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut structure = Structure::default();
        loop {
            match reader.read_event()? {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    match e.local_name().as_ref() {
                        b"String" => {
                            let name = attribute(e, b"name")?.unwrap_or_else(|| {
                                warn!("String element without name attribute");
                                UNKNOWN.to_string()
                            });
                            structure.locations.push(name);
                        }
                        b"Converter" => structure.push_converter(e)?,
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(structure)
    }

    fn push_converter(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let serial = attribute(element, b"sn")?;
        let mac = match attribute(element, b"mac")? {
            Some(mac) => mac,
            None => {
                let restored = serial
                    .as_deref()
                    .map(serial_to_mac)
                    .transpose()
                    .unwrap_or_else(|e| {
                        warn!("{}", e);
                        None
                    });
                match restored {
                    Some(mac) => {
                        warn!(
                            "Converter sn={} has no mac, probably not commissioned. Restored mac {}",
                            serial.as_deref().unwrap_or(UNKNOWN),
                            mac
                        );
                        mac
                    }
                    None => {
                        warn!("Converter without mac or usable sn");
                        UNKNOWN.to_string()
                    }
                }
            }
        };

        self.macs.push(mac);
        self.serials.push(serial.unwrap_or_else(|| {
            warn!("Converter without sn attribute");
            UNKNOWN.to_string()
        }));
        Ok(())
    }

    /// Load `structure_<block>.xml` from `dir`
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::StructureNotFound`] if the file is missing, or an
    /// XML/I/O error if it cannot be read.
    pub fn load_for_block<P: AsRef<Path>>(dir: P, block: &str) -> Result<Self> {
        let path = dir.as_ref().join(structure_file_name(block));
        if !path.exists() {
            return Err(ScanError::StructureNotFound(path));
        }
        let structure = Self::parse(&fs::read_to_string(&path)?)?;
        info!(
            "Getting items from {}: got {} items",
            structure_file_name(block),
            structure.macs.len()
        );
        Ok(structure)
    }

    /// Number of converters listed
    pub fn len(&self) -> usize {
        self.macs.len()
    }

    /// Whether no converter is listed
    pub fn is_empty(&self) -> bool {
        self.macs.is_empty()
    }

    /// Identity of the unit at 0-based `index`
    pub fn identity(&self, index: usize) -> UnitIdentity {
        let field = |values: &[String]| {
            values
                .get(index)
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        UnitIdentity {
            position: index + 1,
            mac: field(&self.macs),
            serial: field(&self.serials),
            location: field(&self.locations),
        }
    }

    /// Identities for the first `total_units` units
    pub fn identities(&self, total_units: usize) -> Vec<UnitIdentity> {
        if self.len() < total_units {
            warn!(
                "Structure lists {} converters but the table has {} units",
                self.len(),
                total_units
            );
        }
        (0..total_units).map(|i| self.identity(i)).collect()
    }
}
