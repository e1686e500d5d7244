/// Cleans up flattened message text.
///
/// Blank lines separate paragraphs; runs of them collapse to one. Lines
/// inside a paragraph keep their breaks, and spaces within a line collapse.
pub fn normalize_body(text: &str) -> String {
    paragraphs(text)
        .iter()
        .map(|lines| {
            lines
                .iter()
                .map(|line| collapse_spaces(line))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Trimmed non-empty lines grouped by the blank lines between them
fn paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut groups: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
