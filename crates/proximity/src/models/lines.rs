//! Rail line codes and per-station line membership.

use std::fmt;

use strum::{EnumCount, IntoEnumIterator};

use crate::identifiers::StationName;

/// Heavy-rail lines tracked for redundancy analysis.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumIter,
    strum::EnumString,
    strum::EnumCount,
    strum::Display,
    strum::IntoStaticStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LineCode {
    NS = 0,
    EW = 1,
    DT = 2,
    CC = 3,
    NE = 4,
    TE = 5,
    CG = 6,
    CE = 7,
}

impl LineCode {
    /// Output column name for this line's membership flag.
    pub fn column_name(self) -> String {
        format!("line_flag_{}", self)
    }
}

/// Line codes present in station listings that are not tracked
/// (Punggol extension, Cross Island, Changi airport branch, Jurong Region).
pub const EXCLUDED_LINE_PREFIXES: &[&str] = &["CP", "CR", "CA", "JR"];

/// Compact set of line memberships. The default is the empty set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineFlags {
    pub(crate) flags: u16,
}

impl LineFlags {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn set(&mut self, line: LineCode) {
        self.flags |= 1 << line as u8;
    }

    pub fn unset(&mut self, line: LineCode) {
        self.flags &= !(1 << line as u8);
    }

    pub fn contains(&self, line: LineCode) -> bool {
        (self.flags & (1 << line as u8)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.flags == 0
    }

    pub fn len(&self) -> usize {
        self.flags.count_ones() as usize
    }

    /// Member lines in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = LineCode> + '_ {
        LineCode::iter().filter(|line| self.contains(*line))
    }

    /// One boolean per tracked line, in declaration order.
    pub fn to_bools(&self) -> [bool; LineCode::COUNT] {
        let mut out = [false; LineCode::COUNT];
        for line in LineCode::iter() {
            out[line as usize] = self.contains(line);
        }
        out
    }

    /// Parse every line code out of an alpha-numeric code string such as
    /// `"NS24 NE6 CC1"`.
    ///
    /// Codes outside the tracked set are ignored.
    pub fn from_code_string(codes: &str) -> Self {
        let mut flags = Self::new();
        for prefix in code_prefixes(codes) {
            if let Ok(line) = prefix.parse::<LineCode>() {
                flags.set(line);
            }
        }
        flags
    }
}

impl FromIterator<LineCode> for LineFlags {
    fn from_iter<I: IntoIterator<Item = LineCode>>(iter: I) -> Self {
        let mut flags = Self::new();
        for line in iter {
            flags.set(line);
        }
        flags
    }
}

impl fmt::Debug for LineFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Non-overlapping runs of two uppercase ASCII letters, left to right.
fn code_prefixes(codes: &str) -> Vec<&str> {
    let bytes = codes.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i].is_ascii_uppercase() && bytes[i + 1].is_ascii_uppercase() {
            out.push(&codes[i..i + 2]);
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// A canonical station and the lines it serves.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationLineRecord {
    /// Lower-cased canonical name.
    pub name: StationName,
    pub lines: LineFlags,
}

impl StationLineRecord {
    pub fn new(name: impl AsRef<str>, lines: LineFlags) -> Self {
        Self {
            name: StationName::new(name.as_ref().trim().to_lowercase()),
            lines,
        }
    }

    /// Build a record from a station name and its raw code string.
    pub fn from_code_string(name: impl AsRef<str>, codes: &str) -> Self {
        Self::new(name, LineFlags::from_code_string(codes))
    }

    /// Build the reference table from raw `(station name, code string)` rows.
    ///
    /// Drops rows with no parseable code, rows whose leading code is in
    /// `excluded_prefixes`, and section header rows that name a whole line
    /// (e.g. "North East Line (NEL)").
    pub fn from_reference_rows<'a, I>(rows: I, excluded_prefixes: &[&str]) -> Vec<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        rows.into_iter()
            .filter(|(name, codes)| {
                let Some(first) = code_prefixes(codes).first().copied() else {
                    tracing::debug!(station = %name, "Dropping reference row without line codes");
                    return false;
                };
                !excluded_prefixes.contains(&first) && !is_line_header(name)
            })
            .map(|(name, codes)| Self::from_code_string(name, codes))
            .collect()
    }
}

/// Listing rows that title a line section rather than a station.
fn is_line_header(name: &str) -> bool {
    let name = name.trim();
    match name.rfind('(') {
        Some(open) if name.ends_with(')') => {
            let title = &name[..open];
            title.contains(" Line") || title.contains("Extension")
        }
        _ => false,
    }
}
