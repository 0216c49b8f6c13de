//! Splitting of SQL script text into individual statements.
//!
//! The scan is a single pass over the script with one explicit [`ParserState`].
//! At every position the narrower context wins: an escaped character is always
//! literal, a block comment hides everything but its own markers, a quoted
//! literal hides comments, directives and delimiters, and only plain text can
//! start a `DELIMITER` directive or close a statement.

/// Delimiter active at the start of every script
pub const DEFAULT_DELIMITER: &str = ";";

const DIRECTIVE_KEYWORD: &str = "delimiter";

/// Immutable text of one script file together with its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBuffer {
    name: String,
    text: String,
}

impl ScriptBuffer {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        ScriptBuffer {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Decode raw file bytes, replacing invalid UTF-8 sequences
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        ScriptBuffer::new(name, String::from_utf8_lossy(bytes).into_owned())
    }

    /// File identity, used for log messages only
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tokenize the buffer starting with the default `;` delimiter
    pub fn statements(&self) -> Vec<Statement> {
        tokenize(&self.text, DEFAULT_DELIMITER)
    }
}

/// One complete SQL statement as delimited in the source script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based position in the script
    pub index: usize,
    /// Statement text, trimmed, without its delimiter
    pub sql: String,
    /// Delimiter that was active when the statement was closed
    pub delimiter: String,
}

/// Scan context for one tokenization pass
#[derive(Debug)]
struct ParserState {
    delimiter: String,
    quote: Option<char>,
    escaped: bool,
    comment_depth: usize,
    line_start: bool,
    /// Byte length of `current` just past its last escaped character
    escape_floor: usize,
    current: String,
    statements: Vec<Statement>,
}

impl ParserState {
    fn new(delimiter: &str) -> Self {
        let delimiter = if delimiter.is_empty() {
            DEFAULT_DELIMITER
        } else {
            delimiter
        };
        ParserState {
            delimiter: delimiter.to_string(),
            quote: None,
            escaped: false,
            comment_depth: 0,
            line_start: true,
            escape_floor: 0,
            current: String::new(),
            statements: Vec::new(),
        }
    }

    fn scan(&mut self, script: &str) {
        let mut pos = 0;
        while pos < script.len() {
            pos += self.step(&script[pos..]);
        }
    }

    /// Process the text at the cursor and return how many bytes were consumed
    fn step(&mut self, rest: &str) -> usize {
        let Some(ch) = rest.chars().next() else {
            return rest.len();
        };
        let width = ch.len_utf8();

        if self.escaped {
            self.escaped = false;
            self.push(ch);
            self.escape_floor = self.current.len();
            return width;
        }

        if self.comment_depth > 0 {
            if rest.starts_with("/*") {
                self.comment_depth += 1;
                self.push_str("/*");
                return 2;
            }
            if rest.starts_with("*/") {
                self.comment_depth -= 1;
                self.push_str("*/");
                return 2;
            }
            self.push(ch);
            return width;
        }

        if let Some(quote) = self.quote {
            if ch == '\\' {
                self.escaped = true;
            } else if ch == quote {
                self.quote = None;
            }
            self.push(ch);
            return width;
        }

        if ch == '\\' {
            self.escaped = true;
            self.push(ch);
            return width;
        }

        // An unmatched "*/" at depth zero falls through as plain text
        if rest.starts_with("/*") {
            self.comment_depth = 1;
            self.push_str("/*");
            return 2;
        }

        if starts_line_comment(rest) {
            return rest.find(['\r', '\n']).unwrap_or(rest.len());
        }

        if matches!(ch, '\'' | '"' | '`') {
            self.quote = Some(ch);
            self.push(ch);
            return width;
        }

        if let Some(consumed) = self.directive(rest) {
            return consumed;
        }

        if rest.starts_with(self.delimiter.as_str()) {
            let consumed = self.delimiter.len();
            self.commit();
            return consumed;
        }

        self.push(ch);
        width
    }

    /// Recognize a `DELIMITER <token>` line, switch to the new delimiter and
    /// return the length of the directive including its line terminator.
    fn directive(&mut self, rest: &str) -> Option<usize> {
        let keyword = rest.get(..DIRECTIVE_KEYWORD.len())?;
        if !keyword.eq_ignore_ascii_case(DIRECTIVE_KEYWORD) {
            return None;
        }
        if !self.line_start && !self.current.trim().is_empty() {
            return None;
        }

        let after = &rest[DIRECTIVE_KEYWORD.len()..];
        if after.chars().next().is_some_and(|c| !c.is_whitespace()) {
            return None;
        }

        let line_len = after.find(['\r', '\n']).unwrap_or(after.len());
        let token = after[..line_len].trim();
        if !token.is_empty() {
            self.delimiter = token.to_string();
        }

        let terminator = &after[line_len..];
        let terminator_len = if terminator.starts_with("\r\n") {
            2
        } else if terminator.is_empty() {
            0
        } else {
            1
        };
        self.line_start = true;
        Some(DIRECTIVE_KEYWORD.len() + line_len + terminator_len)
    }

    fn push(&mut self, ch: char) {
        match ch {
            '\r' | '\n' => self.line_start = true,
            ' ' | '\t' => {}
            _ => self.line_start = false,
        }
        self.current.push(ch);
    }

    fn push_str(&mut self, text: &str) {
        self.line_start = false;
        self.current.push_str(text);
    }

    /// Close the accumulated statement. Trailing whitespace is trimmed, but
    /// never an escaped character.
    fn commit(&mut self) {
        let floor = self.escape_floor;
        let end = floor + self.current[floor..].trim_end().len();
        let sql = self.current[..end].trim_start().to_string();
        self.current.clear();
        self.escape_floor = 0;
        self.statements.push(Statement {
            index: self.statements.len() + 1,
            sql,
            delimiter: self.delimiter.clone(),
        });
    }

    fn finish(mut self) -> Vec<Statement> {
        if !self.current.trim().is_empty() {
            self.commit();
        }
        self.statements
    }
}

/// `-- ` and `# ` comments need a space or tab right after the marker
fn starts_line_comment(rest: &str) -> bool {
    let marker_len = if rest.starts_with("--") {
        2
    } else if rest.starts_with('#') {
        1
    } else {
        return false;
    };
    rest[marker_len..].starts_with([' ', '\t'])
}

/// Split a script into statements, starting with `delimiter` as the active
/// delimiter (an empty value means `;`).
///
/// The tokenizer never fails: unterminated literals or comments simply
/// extend the last statement to the end of the input, and any trailing
/// non-whitespace text without a delimiter becomes the final statement.
pub fn tokenize(script: &str, delimiter: &str) -> Vec<Statement> {
    let mut state = ParserState::new(delimiter);
    state.scan(script);
    state.finish()
}

/// Serialize statements back into a script, each followed by its governing
/// delimiter, with `DELIMITER` lines wherever the delimiter changes.
pub fn render_script(statements: &[Statement]) -> String {
    let mut script = String::new();
    let mut active = DEFAULT_DELIMITER;
    for statement in statements {
        if statement.delimiter != active {
            script.push_str("DELIMITER ");
            script.push_str(&statement.delimiter);
            script.push('\n');
            active = &statement.delimiter;
        }
        script.push_str(&statement.sql);
        script.push_str(&statement.delimiter);
        script.push('\n');
    }
    script
}
