//! Conversions between 1-based column indexes and Excel-style letters.
//!
//! These are used for human-readable diagnostics and for decoding cell
//! references inside XLSX packages. Column detection never depends on them.

/// Converts a 1-based column index to its letter form (1 → "A", 27 → "AA").
/// Index 0 has no letter form and yields an empty string.
pub fn index_to_letter(col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    let mut col = col;
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.iter().rev().map(|byte| *byte as char).collect()
}

/// Converts column letters (case-insensitive) to a 1-based column index.
/// Returns None for empty input or any non-letter character.
pub fn letter_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.bytes().try_fold(0usize, |index, byte| {
        if byte.is_ascii_alphabetic() {
            let digit = (byte.to_ascii_uppercase() - b'A') as usize + 1;
            index.checked_mul(26)?.checked_add(digit)
        } else {
            None
        }
    })
}

/// Returns the Excel-style reference of a 1-based (row, col) pair, e.g. (7, 5) → "E7".
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_letter(col), row)
}

/// Parses an Excel-style reference ("E7", "$E$7") into a 1-based (row, col) pair.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference
        .find(|character: char| character.is_ascii_digit())
        .unwrap_or(reference.len());
    let (letters, digits) = reference.split_at(split);
    let col = letter_to_index(letters)?;
    let row = digits.parse::<usize>().ok().filter(|row| *row > 0)?;
    Some((row, col))
}

/// Parses a range reference ("E7:F7") into its corner positions.
/// A single reference ("E7") is treated as a one-cell range.
pub fn range_to_index(range: &str) -> Option<((usize, usize), (usize, usize))> {
    match range.split_once(':') {
        Some((first, last)) => Some((reference_to_index(first)?, reference_to_index(last)?)),
        None => {
            let position = reference_to_index(range)?;
            Some((position, position))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_to_letter() {
        assert_eq!(index_to_letter(1), "A");
        assert_eq!(index_to_letter(2), "B");
        assert_eq!(index_to_letter(26), "Z");
        assert_eq!(index_to_letter(27), "AA");
        assert_eq!(index_to_letter(28), "AB");
        assert_eq!(index_to_letter(52), "AZ");
        assert_eq!(index_to_letter(53), "BA");
        assert_eq!(index_to_letter(703), "AAA");
        assert_eq!(index_to_letter(0), "");
    }

    #[test]
    fn test_letter_to_index() {
        assert_eq!(letter_to_index("A"), Some(1));
        assert_eq!(letter_to_index("z"), Some(26));
        assert_eq!(letter_to_index("AA"), Some(27));
        assert_eq!(letter_to_index("BA"), Some(53));
        assert_eq!(letter_to_index("AAA"), Some(703));
        assert_eq!(letter_to_index(""), None);
        assert_eq!(letter_to_index("A1"), None);
    }

    #[test]
    fn letters_round_trip_through_index() {
        for col in 1..=2000 {
            assert_eq!(letter_to_index(&index_to_letter(col)), Some(col));
        }
    }

    #[test]
    fn test_reference_to_index() {
        assert_eq!(reference_to_index("E7"), Some((7, 5)));
        assert_eq!(reference_to_index("$AB$12"), Some((12, 28)));
        assert_eq!(reference_to_index("E"), None);
        assert_eq!(reference_to_index("7"), None);
        assert_eq!(reference_to_index("E0"), None);
        assert_eq!(index_to_reference(7, 5), "E7");
    }

    #[test]
    fn test_range_to_index() {
        assert_eq!(range_to_index("E7:F7"), Some(((7, 5), (7, 6))));
        assert_eq!(range_to_index("J8"), Some(((8, 10), (8, 10))));
        assert_eq!(range_to_index("E7:"), None);
    }
}
