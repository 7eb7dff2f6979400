//! G-code Line Parser
//!
//! Reads back the dialect the writer emits: one command per line, words
//! made of a letter and a number, `;` comments to the end of the line.
//! Used by the inspector and by tests; it is not a general G-code parser.

/// One parsed line
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Command(Command),
    /// Comment-only line, text after the `;`
    Comment(String),
    Empty,
}

/// A command such as `G1 X10.000 E0.5000 F3000`
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Upper-cased command word, e.g. `G1`, `M907`, `T2`
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// Words that are not a letter followed by a number
    pub malformed: Vec<String>,
    pub comment: Option<String>,
}

/// A command word like `X10.5`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    pub letter: char,
    pub value: f32,
}

impl Command {
    /// Value of the first parameter with this letter
    pub fn get(&self, letter: char) -> Option<f32> {
        self.parameters
            .iter()
            .find(|p| p.letter == letter)
            .map(|p| p.value)
    }

    pub fn has(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    /// True for linear moves (`G0`/`G1`)
    pub fn is_move(&self) -> bool {
        self.name == "G1" || self.name == "G0"
    }

    /// Tool number of a `T<n>` command
    pub fn tool(&self) -> Option<u32> {
        self.name.strip_prefix('T')?.parse().ok()
    }
}

/// Parse a single line
pub fn parse_line(line: &str) -> ParsedLine {
    let (code, comment) = match line.split_once(';') {
        Some((code, comment)) => (code, Some(comment.to_string())),
        None => (line, None),
    };

    let mut words = code.split_whitespace();
    let Some(name) = words.next() else {
        return match comment {
            Some(text) => ParsedLine::Comment(text),
            None => ParsedLine::Empty,
        };
    };

    let mut parameters = Vec::new();
    let mut malformed = Vec::new();
    for word in words {
        match parse_word(word) {
            Some(parameter) => parameters.push(parameter),
            None => malformed.push(word.to_string()),
        }
    }

    ParsedLine::Command(Command {
        name: name.to_ascii_uppercase(),
        parameters,
        malformed,
        comment,
    })
}

/// Parse every line of a block of G-code
pub fn parse_gcode(gcode: &str) -> impl Iterator<Item = ParsedLine> + '_ {
    gcode.lines().map(parse_line)
}

/// Split `X10.5` into its letter and value
fn parse_word(word: &str) -> Option<Parameter> {
    let mut chars = word.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    let value = chars.as_str().parse::<f32>().ok()?;
    Some(Parameter { letter, value })
}
