/// Bit assignments of the IEEE-488.2 Standard Event Status Register, in
/// bit order.
pub const STANDARD_EVENT_REGISTER: [(&str, u8); 8] = [
    ("Operation Complete", 0x01),
    ("Unused 1", 0x02),
    ("Query Error", 0x04),
    ("Device Error", 0x08),
    ("Execution Error", 0x10),
    ("Command Error", 0x20),
    ("Unused 2", 0x40),
    ("Power On", 0x80),
];

/// Bit assignments of the IEEE-488.2 Status Byte Register, in bit order.
pub const STATUS_BYTE_REGISTER: [(&str, u8); 8] = [
    ("Unused 1", 0x01),
    ("Unused 2", 0x02),
    ("Error Queue", 0x04),
    ("Questionable Data Register", 0x08),
    ("Output Buffer", 0x10),
    ("Standard Event Register", 0x20),
    ("Status Byte Register", 0x40),
    ("Unused 3", 0x80),
];

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("More than one bit mask required, got {got}")]
    NotEnoughBits { got: usize },
}

/// OR the given bit masks together. Composing fewer than two masks is a
/// caller mistake and is rejected.
///
/// ```
/// use labwire::or_of_bits;
///
/// assert_eq!(or_of_bits(&[1, 4, 16])?, 21);
/// # Ok::<(), labwire::RegisterError>(())
/// ```
pub fn or_of_bits(bits: &[u8]) -> Result<u8, RegisterError> {
    if bits.len() < 2 {
        return Err(RegisterError::NotEnoughBits { got: bits.len() });
    }
    Ok(bits.iter().fold(0, |acc, bit| acc | bit))
}

/// Names of the table entries whose mask is set in `value`, in table order.
///
/// ```
/// use labwire::extract_bits;
///
/// let table = [("S1", 0b001), ("S2", 0b010), ("S3", 0b100)];
/// assert_eq!(extract_bits(0b101, &table), vec!["S1", "S3"]);
/// ```
pub fn extract_bits<'a>(value: u8, table: &[(&'a str, u8)]) -> Vec<&'a str> {
    table
        .iter()
        .filter(|(_, mask)| value & mask != 0)
        .map(|(name, _)| *name)
        .collect()
}
