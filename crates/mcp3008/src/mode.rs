use core::fmt;

/// Conversion modes for MCP3008.
///
/// Codes `0..=7` select a differential pair, `8..=15` a single-ended channel.
/// The discriminant is the code sent to the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    /// CH0 = IN+, CH1 = IN-
    DF0 = 0,
    /// CH0 = IN-, CH1 = IN+
    DF1 = 1,
    /// CH2 = IN+, CH3 = IN-
    DF2 = 2,
    /// CH2 = IN-, CH3 = IN+
    DF3 = 3,
    /// CH4 = IN+, CH5 = IN-
    DF4 = 4,
    /// CH4 = IN-, CH5 = IN+
    DF5 = 5,
    /// CH6 = IN+, CH7 = IN-
    DF6 = 6,
    /// CH6 = IN-, CH7 = IN+
    DF7 = 7,
    /// Single-ended CH0
    CH0 = 8,
    /// Single-ended CH1
    CH1 = 9,
    /// Single-ended CH2
    CH2 = 10,
    /// Single-ended CH3
    CH3 = 11,
    /// Single-ended CH4
    CH4 = 12,
    /// Single-ended CH5
    CH5 = 13,
    /// Single-ended CH6
    CH6 = 14,
    /// Single-ended CH7
    CH7 = 15,
}

/// A mode code outside `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mode code {0} is outside 0..=15")]
pub struct InvalidMode(pub u8);

/// Text that is neither a mode name nor a valid code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected CH0 - CH7, DF0 - DF7 or a code in 0..=15")]
pub struct ParseModeError;

impl Mode {
    /// Every mode in code order: DF0 - DF7, then CH0 - CH7.
    pub const ALL: [Self; 16] = [
        Self::DF0,
        Self::DF1,
        Self::DF2,
        Self::DF3,
        Self::DF4,
        Self::DF5,
        Self::DF6,
        Self::DF7,
        Self::CH0,
        Self::CH1,
        Self::CH2,
        Self::CH3,
        Self::CH4,
        Self::CH5,
        Self::CH6,
        Self::CH7,
    ];

    /// Iterate over all modes.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter()
    }

    /// The 4-bit code sent to the chip.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Name of the mode as printed, e.g. `"CH3"`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DF0 => "DF0",
            Self::DF1 => "DF1",
            Self::DF2 => "DF2",
            Self::DF3 => "DF3",
            Self::DF4 => "DF4",
            Self::DF5 => "DF5",
            Self::DF6 => "DF6",
            Self::DF7 => "DF7",
            Self::CH0 => "CH0",
            Self::CH1 => "CH1",
            Self::CH2 => "CH2",
            Self::CH3 => "CH3",
            Self::CH4 => "CH4",
            Self::CH5 => "CH5",
            Self::CH6 => "CH6",
            Self::CH7 => "CH7",
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = InvalidMode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(InvalidMode(code))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl core::str::FromStr for Mode {
    type Err = ParseModeError;

    /// Accepts a mode name (`"CH0"`, `"df3"`) or a decimal code (`"11"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::try_from(code).map_err(|_| ParseModeError);
        }

        Self::all()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or(ParseModeError)
    }
}
