//! A1-style cell references.

/// Converts an A1 reference such as `B3` to zero-based `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col = 0usize;
    for character in letters.chars() {
        let digit = (character.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// Converts zero-based `(row, col)` to an A1 reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        let remainder = (col - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        col = (col - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", letters.into_iter().collect::<String>(), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_references() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("B3"), Some((2, 1)));
        assert_eq!(reference_to_index("z10"), Some((9, 25)));
        assert_eq!(reference_to_index("AA1"), Some((0, 26)));
        assert_eq!(reference_to_index("XFD1048576"), Some((1048575, 16383)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A"), None);
        assert_eq!(reference_to_index("A1B"), None);
    }

    #[test]
    fn format_references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(2, 1), "B3");
        assert_eq!(index_to_reference(0, 26), "AA1");
        assert_eq!(index_to_reference(1048575, 16383), "XFD1048576");
    }
}
