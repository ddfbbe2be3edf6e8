use crate::bail;
use crate::cdc_error;
use crate::error::{CdcResult, ErrorKind};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encodes bytes as lowercase hexadecimal text.
///
/// The output contains exactly two digits per input byte and no prefix or separator,
/// so it can be embedded verbatim in persisted offset fields.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);

    for byte in bytes {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }

    out
}

/// Decodes hexadecimal text into a byte array.
///
/// Each pair of hex digits represents one byte of the output. Upper and lower case
/// digits are both accepted.
pub fn decode_hex(text: &str) -> CdcResult<Vec<u8>> {
    if !text.is_ascii() {
        bail!(
            ErrorKind::DeserializationError,
            "Could not convert from hex text to byte array",
            "the text contains non-ASCII characters"
        );
    }

    if text.len() % 2 != 0 {
        bail!(
            ErrorKind::DeserializationError,
            "Could not convert from hex text to byte array",
            "the number of digits is odd"
        );
    }

    let mut result = Vec::with_capacity(text.len() / 2);

    for i in (0..text.len()).step_by(2) {
        let value = u8::from_str_radix(&text[i..i + 2], 16).map_err(|err| {
            cdc_error!(
                ErrorKind::DeserializationError,
                "Could not convert from hex text to byte array",
                format!("invalid hex digits '{}'", &text[i..i + 2]),
                source: err
            )
        })?;
        result.push(value);
    }

    Ok(result)
}
