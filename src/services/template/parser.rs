use super::TemplateError;

/// One piece of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Resource(String),
    Variable(String),
}

/// A pattern split into literal text and lookups. Parsing never evaluates anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the pattern contains no `@Resource`/`@Variable` calls.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }

    /// The literal text, for patterns without calls.
    #[must_use]
    pub fn literal(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push_text(&mut self, text: &mut String) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.clone()));
        }
        text.clear();
    }
}

/// Parses `source`.
///
/// Grammar: `@@` is a literal `@`; `@Resource("key")` and `@Variable("key")`
/// are lookups; `@name(` for any other name is rejected; any other `@` is text.
/// String arguments accept `\"` and `\\` escapes.
///
/// # Errors
/// Returns `TemplateError::UnknownFunction` or `TemplateError::Syntax`.
pub fn parse(source: &str) -> Result<Pattern, TemplateError> {
    let chars: Vec<char> = source.chars().collect();
    let mut pattern = Pattern::default();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '@' {
            text.push(c);
            i += 1;
            continue;
        }

        if chars.get(i + 1) == Some(&'@') {
            text.push('@');
            i += 2;
            continue;
        }

        let name_start = i + 1;
        let mut name_end = name_start;
        while name_end < chars.len()
            && (chars[name_end].is_ascii_alphanumeric() || chars[name_end] == '_')
            && (name_end > name_start || !chars[name_end].is_ascii_digit())
        {
            name_end += 1;
        }

        if name_end == name_start || chars.get(name_end) != Some(&'(') {
            text.push('@');
            i += 1;
            continue;
        }

        let name: String = chars[name_start..name_end].iter().collect();
        let (argument, next) = parse_call_argument(&chars, name_end + 1)?;
        let segment = match name.as_str() {
            "Resource" => Segment::Resource(argument),
            "Variable" => Segment::Variable(argument),
            _ => return Err(TemplateError::UnknownFunction { name, position: i }),
        };

        pattern.push_text(&mut text);
        pattern.segments.push(segment);
        i = next;
    }

    pattern.push_text(&mut text);
    Ok(pattern)
}

/// Parses `"argument")` starting right after the opening parenthesis.
/// Returns the argument and the index following the closing parenthesis.
fn parse_call_argument(chars: &[char], start: usize) -> Result<(String, usize), TemplateError> {
    let mut i = skip_whitespace(chars, start);
    if chars.get(i) != Some(&'"') {
        return Err(TemplateError::Syntax { position: i, message: "expected a quoted string argument".into() });
    }
    i += 1;

    let mut argument = String::new();
    loop {
        match chars.get(i) {
            None => {
                return Err(TemplateError::Syntax { position: i, message: "unterminated string argument".into() });
            }
            Some('"') => break,
            Some('\\') => match chars.get(i + 1) {
                Some(&escaped @ ('"' | '\\')) => {
                    argument.push(escaped);
                    i += 2;
                }
                _ => {
                    return Err(TemplateError::Syntax { position: i, message: "unsupported escape sequence".into() });
                }
            },
            Some(&c) => {
                argument.push(c);
                i += 1;
            }
        }
    }
    i += 1;

    i = skip_whitespace(chars, i);
    if chars.get(i) != Some(&')') {
        return Err(TemplateError::Syntax { position: i, message: "expected ')'".into() });
    }
    if argument.is_empty() {
        return Err(TemplateError::Syntax { position: start, message: "argument cannot be empty".into() });
    }

    Ok((argument, i + 1))
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_lookups_and_text() {
        let pattern = parse(r#"Hello, @Resource("greeting")! Token: @Variable("Token")"#).unwrap();
        assert_eq!(
            pattern.segments(),
            [
                Segment::Text("Hello, ".into()),
                Segment::Resource("greeting".into()),
                Segment::Text("! Token: ".into()),
                Segment::Variable("Token".into()),
            ]
        );
        assert!(!pattern.is_literal());
    }

    #[test]
    fn test_at_signs_that_are_not_calls_stay_text() {
        let pattern = parse("Write to support@example.com or @@team, @ 9am, @Resource").unwrap();
        assert!(pattern.is_literal());
        assert_eq!(pattern.literal(), "Write to support@example.com or @team, @ 9am, @Resource");
    }

    #[test]
    fn test_whitespace_and_escapes_in_arguments() {
        let pattern = parse(r#"@Resource(  "say \"hi\" \\ now"  )"#).unwrap();
        assert_eq!(pattern.segments(), [Segment::Resource(r#"say "hi" \ now"#.into())]);
    }

    #[test]
    fn test_rejects_other_functions() {
        let err = parse(r#"x @System("rm -rf /")"#).unwrap_err();
        assert_eq!(err, TemplateError::UnknownFunction { name: "System".into(), position: 2 });
    }

    #[test]
    fn test_syntax_errors() {
        for source in [
            r#"@Resource(greeting)"#,
            r#"@Resource("greeting""#,
            r#"@Variable("Token"#,
            r#"@Variable("")"#,
            r#"@Variable("a\nb")"#,
        ] {
            assert!(matches!(parse(source), Err(TemplateError::Syntax { .. })), "'{source}' should fail");
        }
    }
}
