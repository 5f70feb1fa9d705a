use crate::types::TodoKind;

/// Characters that may open a comment, from any of the languages we
/// care about (C-family, shell, TeX, lisps/ini, block comments).
fn is_comment_marker(c: char) -> bool {
    matches!(c, '/' | '#' | '%' | ';' | '*')
}

/// Extract the interior text of a commented line.
///
/// Returns `None` when the line is not a comment at all (its first
/// non-whitespace character is not a comment marker). Returns the
/// trimmed interior otherwise — possibly empty for a bare `//`.
pub fn parse_comment(line: &str) -> Option<&str> {
    let rest = line.trim_start();
    let after = rest.trim_start_matches(is_comment_marker);
    if after.len() == rest.len() {
        return None;
    }
    Some(after.trim())
}

/// A recognized marker line: tag, optional `(author)`, and title text.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedTag {
    pub kind: TodoKind,
    pub author: Option<String>,
    pub title: String,
}

/// Try to read a to-do tag from comment content.
///
/// The tag matches case-insensitively and must be followed by a
/// non-letter so `TODOLIST` does not count as `TODO`. An author
/// annotation in parentheses may follow the tag directly; the title is
/// whatever comes after the `:`/whitespace delimiter. No title means no
/// tag — a bare `TODO:` never opens a block.
pub fn parse_todo_title(content: &str) -> Option<ParsedTag> {
    let chars: Vec<char> = content.chars().collect();
    let size = chars.len();

    for kind in TodoKind::ALL {
        let tag: Vec<char> = kind.tag().chars().collect();
        let prlen = tag.len();
        if size <= prlen {
            continue;
        }
        if !chars[..prlen]
            .iter()
            .zip(&tag)
            .all(|(c, t)| c.to_ascii_uppercase() == *t)
        {
            continue;
        }

        let mut i = prlen;
        if chars[i].is_alphabetic() {
            continue;
        }

        let mut author = None;
        if chars[i] == '(' {
            let start = i + 1;
            while i < size && chars[i] != ')' {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            if !name.is_empty() {
                author = Some(name);
            }
        }

        while i < size && !chars[i].is_whitespace() && chars[i] != ':' {
            i += 1;
        }
        while i < size && (chars[i].is_whitespace() || chars[i] == ':') {
            i += 1;
        }

        if i < size {
            return Some(ParsedTag {
                kind,
                author,
                title: chars[i..].iter().collect(),
            });
        }
    }

    None
}

/// The contiguous run of comment lines belonging to one to-do item.
///
/// `lines[0]` is always the title — a block cannot exist without one.
#[derive(Debug)]
pub struct Block {
    pub kind: TodoKind,
    pub author: Option<String>,
    /// 1-based line number of the marker line
    pub start_line: u32,
    pub lines: Vec<String>,
}

enum State {
    Idle,
    InBlock(Block),
}

/// Line-by-line parser for one file. Strictly sequential: there is at
/// most one in-progress block at any time.
pub struct FileParser {
    state: State,
}

impl FileParser {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Feed one physical line. Returns a finalized block when this line
    /// ends one (a new tag line or a non-comment line).
    pub fn feed(&mut self, line_number: u32, line: &str) -> Option<Block> {
        match parse_comment(line) {
            Some(content) => {
                if let Some(tag) = parse_todo_title(content) {
                    let block = Block {
                        kind: tag.kind,
                        author: tag.author,
                        start_line: line_number,
                        lines: vec![tag.title],
                    };
                    match std::mem::replace(&mut self.state, State::InBlock(block)) {
                        State::InBlock(prev) => Some(prev),
                        State::Idle => None,
                    }
                } else if let State::InBlock(block) = &mut self.state {
                    // consecutive comment line continues the current block
                    block.lines.push(content.to_string());
                    None
                } else {
                    None
                }
            }
            None => match std::mem::replace(&mut self.state, State::Idle) {
                State::InBlock(block) => Some(block),
                State::Idle => None,
            },
        }
    }

    /// End-of-file: finalize any in-progress block.
    pub fn finish(self) -> Option<Block> {
        match self.state {
            State::InBlock(block) => Some(block),
            State::Idle => None,
        }
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}
