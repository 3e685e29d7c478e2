use crate::models::Barcode;

/// Barcode lengths accepted as final output: EAN-8, UPC-A, EAN-13, ITF-14.
pub const VALID_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Check whether a candidate string looks like a product barcode.
///
/// Surrounding whitespace is ignored. The code must consist of ASCII digits
/// only and have one of [`VALID_LENGTHS`]. A wrong code fed into product
/// lookup is worse than asking for another photo, so anything else is
/// rejected.
pub fn is_valid_barcode(candidate: &str) -> bool {
    let code = candidate.trim();
    !code.is_empty()
        && code.bytes().all(|b| b.is_ascii_digit())
        && VALID_LENGTHS.contains(&code.len())
}

/// First candidate that passes validation, in the order given
pub fn first_valid<S: AsRef<str>>(candidates: &[S]) -> Option<Barcode> {
    candidates
        .iter()
        .find_map(|candidate| Barcode::parse(candidate.as_ref()).ok())
}
