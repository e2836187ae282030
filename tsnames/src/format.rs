//! Formatting of `(value, name)` pairs.

use bitflags::bitflags;

use crate::extended::lsb_mask;

bitflags! {
    /// Flags driving [`format_name`]. The empty set means "name only".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NamesFlags: u16 {
        /// Include the value after the name: "name (value)".
        const NAME_VALUE = 0x0001;
        /// Value first: "value (name)".
        const VALUE_NAME = 0x0002;
        /// Value in hexadecimal. This is the default.
        const HEXA = 0x0004;
        /// Value in decimal. Both DECIMAL and HEXA can be specified.
        const DECIMAL = 0x0008;
        /// Display the alternate value instead of the looked-up one.
        const ALTERNATE = 0x0010;
        /// Display the name if defined, the value only if not.
        const NAME_OR_VALUE = 0x0020;
        /// Unknown values produce an empty string.
        const NO_UNKNOWN = 0x0040;
    }
}

impl NamesFlags {
    /// Name only, no value.
    pub const NAME: Self = Self::empty();
    /// Decimal and hexadecimal.
    pub const BOTH: Self = Self::HEXA.union(Self::DECIMAL);
    pub const HEXA_FIRST: Self = Self::VALUE_NAME.union(Self::HEXA);
    pub const DECIMAL_FIRST: Self = Self::VALUE_NAME.union(Self::DECIMAL);
    pub const BOTH_FIRST: Self = Self::VALUE_NAME.union(Self::BOTH);
}

/// Number of hexadecimal digits needed for `bits` bits.
pub fn hexa_digits(bits: usize) -> usize {
    (bits + 3) / 4
}

/// Render a value and its name, `None` or empty meaning "no name".
///
/// Only the `bits` low-order bits of the value are displayed (all bits when
/// `bits` is 0).
pub fn format_name(value: u64, name: Option<&str>, mut flags: NamesFlags, bits: usize, alternate: u64) -> String {
    if !flags.intersects(NamesFlags::BOTH) {
        flags |= NamesFlags::HEXA;
    }

    let value = (if flags.contains(NamesFlags::ALTERNATE) { alternate } else { value }) & lsb_mask(bits);
    let width = hexa_digits(bits);

    let name = match name.filter(|n| !n.is_empty()) {
        Some(name) => name,
        None if flags.contains(NamesFlags::NO_UNKNOWN) => return String::new(),
        None if flags.contains(NamesFlags::NAME_OR_VALUE) => {
            return if flags.contains(NamesFlags::DECIMAL) {
                value.to_string()
            } else {
                format!("0x{:0width$X}", value, width = width)
            };
        }
        None => {
            flags |= NamesFlags::NAME_VALUE;
            "unknown"
        }
    };

    if !flags.intersects(NamesFlags::NAME_VALUE | NamesFlags::VALUE_NAME) {
        return name.to_string();
    }

    let first = flags.contains(NamesFlags::VALUE_NAME);
    let hexa = flags.contains(NamesFlags::HEXA);
    let decimal = flags.contains(NamesFlags::DECIMAL);

    match (first, hexa, decimal) {
        (false, true, false) => format!("{} (0x{:0width$X})", name, value, width = width),
        (false, false, _) => format!("{} ({})", name, value),
        (false, true, true) => format!("{} (0x{:0width$X}, {})", name, value, value, width = width),
        (true, true, false) => format!("0x{:0width$X} ({})", value, name, width = width),
        (true, false, _) => format!("{} ({})", value, name),
        (true, true, true) => format!("0x{:0width$X} ({}, {})", value, value, name, width = width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_only() {
        assert_eq!(format_name(0x42, Some("SDT Actual"), NamesFlags::NAME, 8, 0), "SDT Actual");
    }

    #[test]
    fn test_layouts() {
        let name = Some("PMT");
        assert_eq!(format_name(2, name, NamesFlags::NAME_VALUE, 8, 0), "PMT (0x02)");
        assert_eq!(format_name(2, name, NamesFlags::NAME_VALUE | NamesFlags::DECIMAL, 8, 0), "PMT (2)");
        assert_eq!(format_name(2, name, NamesFlags::NAME_VALUE | NamesFlags::BOTH, 8, 0), "PMT (0x02, 2)");
        assert_eq!(format_name(2, name, NamesFlags::HEXA_FIRST, 8, 0), "0x02 (PMT)");
        assert_eq!(format_name(2, name, NamesFlags::DECIMAL_FIRST, 8, 0), "2 (PMT)");
        assert_eq!(format_name(2, name, NamesFlags::BOTH_FIRST, 8, 0), "0x02 (2, PMT)");
        assert_eq!(format_name(0x1FFF, Some("Null"), NamesFlags::NAME_VALUE, 13, 0), "Null (0x1FFF)");
    }

    #[test]
    fn test_unknown_values() {
        assert_eq!(format_name(0x99, None, NamesFlags::NAME, 8, 0), "unknown (0x99)");
        assert_eq!(format_name(0x99, Some(""), NamesFlags::DECIMAL, 8, 0), "unknown (153)");
        assert_eq!(format_name(0x99, None, NamesFlags::HEXA_FIRST, 8, 0), "0x99 (unknown)");
        assert_eq!(format_name(0x99, None, NamesFlags::NAME_OR_VALUE, 8, 0), "0x99");
        assert_eq!(format_name(0x99, None, NamesFlags::NAME_OR_VALUE | NamesFlags::DECIMAL, 8, 0), "153");
        assert_eq!(format_name(0x99, None, NamesFlags::NO_UNKNOWN | NamesFlags::NAME_VALUE, 8, 0), "");
        assert_eq!(format_name(0x99, Some("Known"), NamesFlags::NAME_OR_VALUE, 8, 0), "Known");
    }

    #[test]
    fn test_alternate_and_mask() {
        assert_eq!(format_name(0x01AA, Some("X"), NamesFlags::NAME_VALUE, 8, 0), "X (0xAA)");
        assert_eq!(format_name(0x01AA, Some("X"), NamesFlags::NAME_VALUE, 0, 0), "X (0x1AA)");
        assert_eq!(
            format_name(0x10, Some("X"), NamesFlags::NAME_VALUE | NamesFlags::ALTERNATE, 16, 0x1234),
            "X (0x1234)"
        );
    }

    #[test]
    fn test_hexa_digits() {
        assert_eq!(hexa_digits(0), 0);
        assert_eq!(hexa_digits(1), 1);
        assert_eq!(hexa_digits(8), 2);
        assert_eq!(hexa_digits(13), 4);
        assert_eq!(hexa_digits(24), 6);
    }
}
