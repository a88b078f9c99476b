//! A1 notation.

/// Column letters for a 1-based column index: 1 → `A`, 27 → `AA`.
pub fn column_letter(column: usize) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Tab title as a range prefix, with embedded quotes doubled.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Range of a single cell, e.g. `'Words'!F12`.
pub fn cell_range(title: &str, column: usize, row_number: usize) -> String {
    format!("{}!{}{}", quote_title(title), column_letter(column), row_number)
}
