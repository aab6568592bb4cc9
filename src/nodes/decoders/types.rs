//! Common decoder types and enums

use std::fmt;

/// Output row an annotation is displayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationRow {
    TdiData,
    TdiCommands,
    TdoData,
    Sync,
    Warnings,
}

impl AnnotationRow {
    pub const ALL: [AnnotationRow; 5] = [
        AnnotationRow::TdiData,
        AnnotationRow::TdiCommands,
        AnnotationRow::TdoData,
        AnnotationRow::Sync,
        AnnotationRow::Warnings,
    ];

    pub fn id(self) -> &'static str {
        match self {
            AnnotationRow::TdiData => "tdi-data",
            AnnotationRow::TdiCommands => "tdi-cmds",
            AnnotationRow::TdoData => "tdo-data",
            AnnotationRow::Sync => "sync",
            AnnotationRow::Warnings => "warnings",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AnnotationRow::TdiData => "TDI data",
            AnnotationRow::TdiCommands => "TDI commands",
            AnnotationRow::TdoData => "TDO data",
            AnnotationRow::Sync => "Sync",
            AnnotationRow::Warnings => "Warnings",
        }
    }
}

/// Category of a decoded annotation
///
/// The numeric ids are stable and identify the class to display layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationClass {
    /// Byte clocked in on TDI
    TdiData = 0,
    /// Byte clocked out on TDO
    TdoData = 1,
    /// TDI byte recognized as an ICP command
    TdiCommand = 2,
    /// Diagnostic text
    Warning = 3,
    /// The 9th (sync) clock of a byte
    Sync = 4,
}

impl AnnotationClass {
    pub const ALL: [AnnotationClass; 5] = [
        AnnotationClass::TdiData,
        AnnotationClass::TdoData,
        AnnotationClass::TdiCommand,
        AnnotationClass::Warning,
        AnnotationClass::Sync,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            AnnotationClass::TdiData => "tdi-data",
            AnnotationClass::TdoData => "tdo-data",
            AnnotationClass::TdiCommand => "tdi-cmd",
            AnnotationClass::Warning => "warning",
            AnnotationClass::Sync => "sync",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AnnotationClass::TdiData => "TDI data",
            AnnotationClass::TdoData => "TDO data",
            AnnotationClass::TdiCommand => "TDI command",
            AnnotationClass::Warning => "Warning",
            AnnotationClass::Sync => "Sync clock",
        }
    }

    pub fn row(self) -> AnnotationRow {
        match self {
            AnnotationClass::TdiData => AnnotationRow::TdiData,
            AnnotationClass::TdoData => AnnotationRow::TdoData,
            AnnotationClass::TdiCommand => AnnotationRow::TdiCommands,
            AnnotationClass::Warning => AnnotationRow::Warnings,
            AnnotationClass::Sync => AnnotationRow::Sync,
        }
    }
}

impl fmt::Display for AnnotationClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded annotation spanning `[start, end)` sample positions
///
/// `texts` holds display variants from longest to shortest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub start: u64,
    pub end: u64,
    pub class: AnnotationClass,
    pub texts: Vec<String>,
}

impl Annotation {
    pub fn new<T: Into<String>>(
        start: u64,
        end: u64,
        class: AnnotationClass,
        texts: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            start,
            end,
            class,
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }

    /// Longest display text
    pub fn text(&self) -> &str {
        self.texts.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{} {}: {}", self.start, self.end, self.class, self.text())
    }
}

/// One byte clocked by 9 TCK edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteFrame {
    /// Position of the first data bit edge
    pub start_position: u64,
    /// Position of the sync edge
    pub end_position: u64,
    /// TDI byte, MSB first
    pub data_in: u8,
    /// TDO byte, LSB first (zero when TDO is not connected)
    pub data_out: u8,
}
