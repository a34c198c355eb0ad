#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    /// Inside `$tag$ ... $tag$`; the opener spans `open..open + len`.
    DollarQuoted { open: usize, len: usize },
}

pub(super) const LINE_COMMENT: [u8; 2] = *b"--";
pub(super) const BLOCK_OPEN: [u8; 2] = *b"/*";
pub(super) const BLOCK_CLOSE: [u8; 2] = *b"*/";
pub(super) const PLACEHOLDER_OPEN: [u8; 2] = *b"#{";

pub(super) fn starts_pair(bytes: &[u8], idx: usize, pair: [u8; 2]) -> bool {
    bytes.get(idx..idx + 2) == Some(&pair[..])
}

/// Length of a `$tag$` opener at `start` (the tag is empty or word characters).
pub(super) fn dollar_tag_len(bytes: &[u8], start: usize) -> Option<usize> {
    let rest = bytes.get(start + 1..)?;
    let close = rest.iter().position(|&b| b == b'$')?;
    rest[..close]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_')
        .then_some(close + 2)
}

/// Whether the dollar-quote opener at `open` repeats at `idx`.
pub(super) fn closes_dollar_quote(bytes: &[u8], idx: usize, open: usize, len: usize) -> bool {
    bytes.get(idx..idx + len) == bytes.get(open..open + len)
}

/// Find the `}` closing a `#{` opened at `start`. Returns the index of the brace.
pub(super) fn scan_placeholder(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start + 2;
    while idx < bytes.len() {
        match bytes[idx] {
            b'}' => return Some(idx),
            b'\n' | b'#' => return None,
            _ => idx += 1,
        }
    }
    None
}
