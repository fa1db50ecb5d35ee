//! A configuration source made of `-c` options from the command line.

use config::{ConfigError, Source, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Lines of toml given on the command line, one per `-c` option.
///
/// The lines are joined into a single toml document.  A line of the
/// form `key=bareword` has its bareword quoted first, so that users
/// can write `bound_timeout=keep` rather than `bound_timeout="keep"`.
#[derive(Debug, Clone, Default)]
pub(crate) struct CmdLine {
    /// The lines, in the order they were given.
    lines: Vec<String>,
}

impl CmdLine {
    /// Make a new source with no lines.
    pub(crate) fn new() -> Self {
        CmdLine::default()
    }

    /// Add one line of toml.
    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Join our lines into a single toml document.
    fn to_toml(&self) -> String {
        self.lines
            .iter()
            .map(|line| quote_bareword(line).unwrap_or_else(|| line.clone()) + "\n")
            .collect()
    }

    /// Rewrite a toml error message so that it names the option that
    /// caused it, rather than a line of a document that the user never
    /// saw.
    fn describe_error(&self, msg: &str, line_col: Option<(usize, usize)>) -> String {
        /// Matches the position suffix that the toml crate adds.
        static POSITION: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(.*?) at line [0-9]+ column [0-9]+$").expect("bad built-in regex")
        });
        let msg = POSITION
            .captures(msg)
            .and_then(|c| c.get(1))
            .map_or(msg, |m| m.as_str());

        match line_col.and_then(|(line, _)| self.lines.get(line)) {
            Some(option) => format!("{} in option {:?}", msg, option),
            None => format!("{} in command-line options", msg),
        }
    }
}

impl Source for CmdLine {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<HashMap<String, Value>, ConfigError> {
        let doc: toml::Value = toml::from_str(&self.to_toml())
            .map_err(|e| ConfigError::Message(self.describe_error(&e.to_string(), e.line_col())))?;
        doc.try_into()
            .map_err(|e| ConfigError::Foreign(Box::new(e)))
    }
}

/// If `line` looks like `key=bareword`, return it with the bareword in
/// quotes.
///
/// Keys may be dotted.  Barewords are letters, digits and underscores.
fn quote_bareword(line: &str) -> Option<String> {
    /// Matches `key = bareword`, capturing both sides.
    static KEY_BAREWORD: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r#"(?x:
               ^ [ \t]*
               # the key: one or more dotted parts
               ((?:[a-zA-Z0-9_\-]+\.)* [a-zA-Z0-9_\-]+)
               [ \t]* = [ \t]*
               # the value: no hyphens, no dots, no quotes
               ([a-zA-Z0-9_]+)
               [ \t]* $)"#,
        )
        .expect("bad built-in regex")
    });

    KEY_BAREWORD
        .captures(line)
        .map(|c| format!("{}=\"{}\"", &c[1], &c[2]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn barewords() {
        assert_eq!(quote_bareword("trace"), None);
        assert_eq!(quote_bareword("=30"), None);
        assert_eq!(quote_bareword("timeout_secs=[1,2]"), None);
        assert_eq!(quote_bareword("bound_timeout=re-arm"), None);
        assert_eq!(quote_bareword("x=\"keep\""), None);

        assert_eq!(
            quote_bareword("bound_timeout=keep"),
            Some("bound_timeout=\"keep\"".into())
        );
        assert_eq!(
            quote_bareword(" timeout_secs = 30 "),
            Some("timeout_secs=\"30\"".into())
        );
        assert_eq!(
            quote_bareword("a.b-c.d=e_f"),
            Some("a.b-c.d=\"e_f\"".into())
        );
    }

    #[test]
    fn error_messages() {
        let mut cl = CmdLine::new();
        cl.push("trace=true");
        cl.push("randomize=[");

        assert_eq!(
            cl.describe_error("expected a value at line 2 column 11", Some((1, 10))),
            "expected a value in option \"randomize=[\""
        );
        assert_eq!(
            cl.describe_error("something odd", Some((5, 0))),
            "something odd in command-line options"
        );
        assert_eq!(
            cl.describe_error("something odd at line 1 column 1", None),
            "something odd in command-line options"
        );
        assert!(cl.collect().is_err());
    }

    #[test]
    fn collect_values() {
        let mut cl = CmdLine::new();
        cl.push("timeout_secs=5");
        cl.push("bound_timeout=rearm");
        cl.push("name=\"two words\"");
        cl.push("ports=[1080,1081]");

        let v = cl.collect().unwrap();
        assert_eq!(v["timeout_secs"], "5".into());
        assert_eq!(v["bound_timeout"], "rearm".into());
        assert_eq!(v["name"], "two words".into());
        assert_eq!(v["ports"], vec![1080, 1081].into());
    }
}
