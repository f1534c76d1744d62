//! Overlapping plain-text windows.

/// Split text into word-wrapped windows of at most `chunk_size` characters.
///
/// Every window after the first is prefixed with the last `overlap`
/// characters of the window before it. Words longer than `chunk_size` are
/// kept whole.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let lines = wrap(text, chunk_size);

    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            out.push(line.clone());
        } else {
            out.push(format!("{}{}", tail(&lines[i - 1], overlap), line));
        }
    }
    out
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if line_chars > 0 && line_chars + 1 + word_chars > width {
            lines.push(std::mem::take(&mut line));
            line_chars = 0;
        }
        if line_chars > 0 {
            line.push(' ');
            line_chars += 1;
        }
        line.push_str(word);
        line_chars += word_chars;
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
