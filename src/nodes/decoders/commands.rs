//! ICP command opcodes

use std::fmt;

/// Command byte sent on TDI by the programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SetOffsetL,
    SetOffsetH,
    SetData,
    GetOffset,
    ReadFlash,
    Ping,
    ReadCustom,
    SetXpage,
    WriteFlash,
    WriteCustom,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::SetOffsetL,
        Command::SetOffsetH,
        Command::SetData,
        Command::GetOffset,
        Command::ReadFlash,
        Command::Ping,
        Command::ReadCustom,
        Command::SetXpage,
        Command::WriteFlash,
        Command::WriteCustom,
    ];

    /// Look up the command for a TDI byte. Most bytes are payload, not commands.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        let command = match opcode {
            0x40 => Command::SetOffsetL,
            0x41 => Command::SetOffsetH,
            0x42 => Command::SetData,
            0x43 => Command::GetOffset,
            0x44 => Command::ReadFlash,
            0x49 => Command::Ping,
            0x4A => Command::ReadCustom,
            0x4C => Command::SetXpage,
            0x6E => Command::WriteFlash,
            0xA5 => Command::WriteCustom,
            _ => return None,
        };
        Some(command)
    }

    pub fn opcode(self) -> u8 {
        match self {
            Command::SetOffsetL => 0x40,
            Command::SetOffsetH => 0x41,
            Command::SetData => 0x42,
            Command::GetOffset => 0x43,
            Command::ReadFlash => 0x44,
            Command::Ping => 0x49,
            Command::ReadCustom => 0x4A,
            Command::SetXpage => 0x4C,
            Command::WriteFlash => 0x6E,
            Command::WriteCustom => 0xA5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::SetOffsetL => "SET_OFFSET_L",
            Command::SetOffsetH => "SET_OFFSET_H",
            Command::SetData => "SET_DATA",
            Command::GetOffset => "GET_OFFSET",
            Command::ReadFlash => "READ_FLASH",
            Command::Ping => "PING",
            Command::ReadCustom => "READ_CUSTOM",
            Command::SetXpage => "SET_XPAGE",
            Command::WriteFlash => "WRITE_FLASH",
            Command::WriteCustom => "WRITE_CUSTOM",
        }
    }

    /// Three character form for narrow displays
    pub fn abbreviation(self) -> &'static str {
        &self.name()[..3]
    }

    /// Display variants, longest first: `NAME (0xHH)`, `NAME`, abbreviation
    pub fn display_texts(self) -> [String; 3] {
        [
            format!("{} (0x{:02X})", self.name(), self.opcode()),
            self.name().to_string(),
            self.abbreviation().to_string(),
        ]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_lookup_is_consistent() {
        for command in Command::ALL {
            assert_eq!(Command::from_opcode(command.opcode()), Some(command));
        }
    }

    #[test]
    fn test_only_ten_opcodes_are_commands() {
        let known = (0..=u8::MAX)
            .filter(|&b| Command::from_opcode(b).is_some())
            .count();
        assert_eq!(known, Command::ALL.len());
        assert_eq!(Command::from_opcode(0x45), None);
        assert_eq!(Command::from_opcode(0x00), None);
        assert_eq!(Command::from_opcode(0xFF), None);
    }

    #[test]
    fn test_display_texts() {
        assert_eq!(
            Command::Ping.display_texts(),
            ["PING (0x49)".to_string(), "PING".to_string(), "PIN".to_string()]
        );
        assert_eq!(Command::WriteCustom.display_texts()[0], "WRITE_CUSTOM (0xA5)");
        assert_eq!(Command::ReadCustom.abbreviation(), "REA");
        assert_eq!(Command::SetXpage.to_string(), "SET_XPAGE");
    }
}
